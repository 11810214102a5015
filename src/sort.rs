//! `Array.prototype.sort`, spec §4.7.
//!
//! Grounded on `original_source/src/builtin/array.c`'s `sortAndMerge`/
//! `merge`/`rotate`/`search`: an in-place stable merge sort. Runs under 8
//! elements use binary insertion sort; longer runs split in half, sort each
//! half recursively, then merge two sorted runs in place by binary-searching
//! the shorter run's midpoint into the other run and rotating the block
//! between them into place (the "rotation merge" — no second buffer, unlike
//! a textbook merge sort).

use crate::context::Context;
use crate::interpreter::{call_function_value, to_primitive, EvalResult};
use crate::pool::ObjectHandle;
use crate::value::Value;

/// Sorts the dense element range `[0, length)` of `object` in place.
/// `comparator` mirrors the original's function-or-undefined argument:
/// `None` means "default comparison" (ToString, then lexicographic).
pub fn sort_in_place(ctx: &mut Context, object: ObjectHandle, length: u32, comparator: Option<ObjectHandle>) -> EvalResult<()> {
    sort_and_merge(ctx, object, comparator, 0, length)
}

fn element(ctx: &Context, object: ObjectHandle, index: u32) -> Option<Value> {
    ctx.pool.get(object).get_element(index).and_then(|p| p.as_value().cloned())
}

fn put(ctx: &mut Context, object: ObjectHandle, index: u32, value: Option<Value>) {
    match value {
        Some(v) => ctx.pool.get_mut(object).set_element(index, v, crate::object::PropertyFlags::ALL),
        None => {
            ctx.pool.get_mut(object).delete_element(index);
        }
    }
}

/// `true` iff `left` sorts strictly before `right`. Missing elements (a
/// sparse hole) and `undefined` always sort to the end, ahead of nothing
/// else — mirrors the original's `check != 1` / `undefinedType` fast paths
/// before it ever calls into the comparator.
fn less(ctx: &mut Context, left: &Option<Value>, right: &Option<Value>, comparator: Option<ObjectHandle>) -> EvalResult<bool> {
    let left_absent = matches!(left, None | Some(Value::Undefined));
    let right_absent = matches!(right, None | Some(Value::Undefined));
    if left_absent {
        return Ok(false);
    }
    if right_absent {
        return Ok(true);
    }
    let left = left.clone().expect("checked above");
    let right = right.clone().expect("checked above");
    match comparator {
        Some(f) => {
            let result = call_function_value(ctx, f, Value::Undefined, &[left, right])?;
            let n = to_primitive(ctx, &result, false)?.to_number_primitive();
            Ok(n < 0.0)
        }
        None => {
            let ls = to_primitive(ctx, &left, true)?.to_string_primitive();
            let rs = to_primitive(ctx, &right, true)?.to_string_primitive();
            Ok(ls.as_str() < rs.as_str())
        }
    }
}

/// Binary search for the insertion point of `target` in the sorted range
/// `[first, last)`: the leftmost index where `target` would still keep the
/// range ordered (first index `i` with `!(element[i] < target)`).
fn search(ctx: &mut Context, object: ObjectHandle, comparator: Option<ObjectHandle>, mut first: u32, mut last: u32, target: &Option<Value>) -> EvalResult<u32> {
    while first < last {
        let half = (first + last) / 2;
        let left = element(ctx, object, half);
        if less(ctx, &left, target, comparator)? {
            first = half + 1;
        } else {
            last = half;
        }
    }
    Ok(first)
}

/// Block-swap rotate of `[first, last)` so that the sub-range `[pivot,
/// last)` moves in front of `[first, pivot)`, via the juggling (GCD-cycle)
/// algorithm: each cycle of the permutation is walked once, so the whole
/// rotation runs in `O(last - first)` swaps with O(1) extra space.
fn rotate(ctx: &mut Context, object: ObjectHandle, first: u32, pivot: u32, last: u32) {
    if first == pivot || pivot == last {
        return;
    }
    let shift = pivot - first;
    let span = last - first;
    let cycles = gcd(shift, span);
    for n in 0..cycles {
        let left_value = element(ctx, object, first + n);
        let mut a = first + n;
        let mut b = a + shift;
        while b != first + n {
            let value = element(ctx, object, b);
            put(ctx, object, a, value);
            a = b;
            b = if last - b > shift { b + shift } else { pivot - (last - b) };
        }
        put(ctx, object, a, left_value);
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Merges two adjacent sorted runs `[first, pivot)` and `[pivot, last)` of
/// lengths `len1`/`len2` in place.
fn merge(ctx: &mut Context, object: ObjectHandle, comparator: Option<ObjectHandle>, first: u32, mut pivot: u32, last: u32, len1: u32, len2: u32) -> EvalResult<()> {
    if len1 == 0 || len2 == 0 {
        return Ok(());
    }
    if len1 + len2 == 2 {
        let left = element(ctx, object, pivot);
        let right = element(ctx, object, first);
        if less(ctx, &left, &right, comparator)? {
            put(ctx, object, pivot, right);
            put(ctx, object, first, left);
        }
        return Ok(());
    }

    let (left, right, half1, half2);
    if len1 > len2 {
        let h1 = len1 / 2;
        let probe = element(ctx, object, first + h1);
        left = first + h1;
        right = search(ctx, object, comparator, pivot, last, &probe)?;
        half2 = right - pivot;
        half1 = h1;
    } else {
        let h2 = len2 / 2;
        let probe = element(ctx, object, pivot + h2);
        left = search(ctx, object, comparator, first, pivot, &probe)?;
        right = pivot + h2;
        half2 = h2;
        half1 = left - first;
    }
    rotate(ctx, object, left, pivot, right);

    pivot = left + half2;
    merge(ctx, object, comparator, first, left, pivot, half1, half2)?;
    merge(ctx, object, comparator, pivot, right, last, len1 - half1, len2 - half2)
}

/// Binary insertion sort for short runs, otherwise split/recurse/merge.
fn sort_and_merge(ctx: &mut Context, object: ObjectHandle, comparator: Option<ObjectHandle>, first: u32, last: u32) -> EvalResult<()> {
    if last - first < 8 {
        let mut i = first + 1;
        while i < last {
            let right = element(ctx, object, i);
            let mut j = i;
            while j > first {
                let left = element(ctx, object, j - 1);
                if less(ctx, &left, &right, comparator)? {
                    break;
                }
                put(ctx, object, j, left);
                j -= 1;
            }
            put(ctx, object, j, right);
            i += 1;
        }
        return Ok(());
    }

    let half = (first + last) / 2;
    sort_and_merge(ctx, object, comparator, first, half)?;
    sort_and_merge(ctx, object, comparator, half, last)?;
    merge(ctx, object, comparator, first, half, last, half - first, last - half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Limits, Prototypes};
    use crate::object::{ObjectData, ObjectKind};

    fn new_context() -> Context {
        let mut ctx = Context::new(Limits::default());
        let object = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        ctx.set_prototypes(Prototypes {
            object,
            function: object,
            array: object,
            string: object,
            number: object,
            boolean: object,
            error: object,
            regexp: object,
            date: object,
        });
        ctx
    }

    fn array_of(ctx: &mut Context, values: &[i32]) -> ObjectHandle {
        let proto = ctx.prototypes().array;
        let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(proto)));
        for (i, &v) in values.iter().enumerate() {
            ctx.pool.get_mut(handle).set_element(i as u32, Value::Int(v), crate::object::PropertyFlags::ALL);
        }
        handle
    }

    fn collect(ctx: &Context, handle: ObjectHandle) -> Vec<i32> {
        let len = ctx.pool.get(handle).element_count();
        (0..len as u32)
            .map(|i| match element(ctx, handle, i) {
                Some(Value::Int(n)) => n,
                other => panic!("expected Int element, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn sorts_small_run_with_insertion_sort() {
        let mut ctx = new_context();
        let arr = array_of(&mut ctx, &[5, 3, 4, 1, 2]);
        sort_in_place(&mut ctx, arr, 5, None).unwrap();
        assert_eq!(collect(&ctx, arr), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn sorts_large_run_through_merge_path() {
        let mut ctx = new_context();
        let values: Vec<i32> = (0..40).rev().collect();
        let arr = array_of(&mut ctx, &values);
        sort_in_place(&mut ctx, arr, 40, None).unwrap();
        assert_eq!(collect(&ctx, arr), (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn default_comparator_sorts_lexicographically() {
        let mut ctx = new_context();
        let arr = array_of(&mut ctx, &[10, 2, 1]);
        sort_in_place(&mut ctx, arr, 3, None).unwrap();
        // "1" < "10" < "2" as strings.
        assert_eq!(collect(&ctx, arr), vec![1, 10, 2]);
    }
}
