//! `Date` constructor and `Date.prototype`. `original_source/src/object/
//! date.c`'s `setup()` is itself a near-stub (every method commented out,
//! a bare `[object Date]` tag registered and nothing else) — SPEC_FULL.md
//! keeps that scope deliberately narrow (construction, `getTime`/`valueOf`,
//! `toISOString`; no calendar arithmetic), so this module mirrors the
//! original's minimalism rather than filling in ES5's full `Date.prototype`.

use super::{define_constructor, define_native};
use crate::context::Context;
use crate::estr::EStr;
use crate::interpreter::{type_error, EvalResult};
use crate::object::ObjectKind;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().date;
    define_native(ctx, prototype, "getTime", 0, get_time);
    define_native(ctx, prototype, "valueOf", 0, get_time);
    define_native(ctx, prototype, "toISOString", 0, to_iso_string);
    define_native(ctx, prototype, "toString", 0, to_iso_string);
    define_constructor(ctx, "Date", 0, constructor, prototype);
}

fn this_millis(ctx: &Context, this: &Value) -> EvalResult<f64> {
    match this {
        Value::Object(h) => match &ctx.pool.get(*h).kind {
            ObjectKind::Date(millis) => Ok(*millis),
            _ => Err(type_error("not a Date")),
        },
        _ => Err(type_error("not a Date")),
    }
}

fn now_millis() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as f64).unwrap_or(f64::NAN)
}

fn constructor(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let millis = match args.first() {
        None => now_millis(),
        Some(v) => v.to_number_primitive(),
    };
    let proto = ctx.prototypes().date;
    Ok(Value::Object(ctx.pool.alloc(crate::object::ObjectData::new(ObjectKind::Date(millis), Some(proto)))))
}

fn get_time(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(this_millis(ctx, this)?))
}

/// Formats `millis` as `YYYY-MM-DDTHH:mm:ss.sssZ` using a Gregorian
/// civil-from-days conversion (Howard Hinnant's well-known algorithm),
/// avoiding a `chrono`/`time` dependency for one formatting path.
fn to_iso_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let millis = this_millis(ctx, this)?;
    if millis.is_nan() {
        return Err(crate::interpreter::reference_error("Invalid Date"));
    }
    let total_millis = millis as i64;
    let mut days = total_millis.div_euclid(86_400_000);
    let mut ms_of_day = total_millis.rem_euclid(86_400_000);
    let hours = ms_of_day / 3_600_000;
    ms_of_day %= 3_600_000;
    let minutes = ms_of_day / 60_000;
    ms_of_day %= 60_000;
    let seconds = ms_of_day / 1000;
    let thousandths = ms_of_day % 1000;

    days += 719_468;
    let era = if days >= 0 { days } else { days - 146_096 } / 146_097;
    let day_of_era = days - era * 146_097;
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let year = year_of_era + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { year + 1 } else { year };

    Ok(Value::Str(EStr::new(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year, month, day, hours, minutes, seconds, thousandths
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Limits;

    fn new_context() -> Context {
        let mut ctx = Context::new(Limits::default());
        super::super::install(&mut ctx);
        ctx
    }

    #[test]
    fn to_iso_string_formats_epoch() {
        let mut ctx = new_context();
        let proto = ctx.prototypes().date;
        let handle = ctx.pool.alloc(crate::object::ObjectData::new(ObjectKind::Date(0.0), Some(proto)));
        let result = to_iso_string(&mut ctx, &Value::Object(handle), &[]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn get_time_returns_stored_millis() {
        let mut ctx = new_context();
        let proto = ctx.prototypes().date;
        let handle = ctx.pool.alloc(crate::object::ObjectData::new(ObjectKind::Date(12345.0), Some(proto)));
        let result = get_time(&mut ctx, &Value::Object(handle), &[]).unwrap();
        assert_eq!(result.to_number_primitive(), 12345.0);
    }
}
