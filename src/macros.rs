/// Construct a `polydoc::Value` from a JSON-like literal.
///
/// ```
/// # use polydoc::blob;
/// #
/// let value = blob!({
///     "kind": "SubEvent",
///     "message": "level 1",
///     "sub_events": [
///         { "kind": "SubEvent", "message": "level 2", "sub_events": [] }
///     ]
/// });
/// ```
///
/// Variables or expressions can be interpolated into the literal. Any type interpolated into an
/// array element or map value must implement `Into<Value>`, while any type interpolated into a
/// map key must implement `Into<String>`.
///
/// ```
/// # use polydoc::{blob, Value};
/// #
/// let id = 7;
/// let message = "interpolated";
/// let value = blob!({
///     "_id": id,
///     "message": message,
///     "public": id > 3,
/// });
/// assert_eq!(value["_id"], Value::Int(7));
/// ```
///
/// Keys keep the order they were written in. Trailing commas are allowed inside both arrays and
/// maps.
#[macro_export(local_inner_macros)]
macro_rules! blob {
    // Hide distracting implementation details from the generated rustdoc.
    ($($blob:tt)+) => {
        blob_internal!($($blob)+)
    };
}

#[macro_export(local_inner_macros)]
#[doc(hidden)]
macro_rules! blob_internal {
    // Array contents, one element at a time: blob_internal!(@array [] $($tt)*)
    (@array [$($elems:expr,)*]) => {
        blob_internal_vec![$($elems,)*]
    };

    (@array [$($elems:expr),*]) => {
        blob_internal_vec![$($elems),*]
    };

    (@array [$($elems:expr,)*] null $($rest:tt)*) => {
        blob_internal!(@array [$($elems,)* blob_internal!(null)] $($rest)*)
    };

    (@array [$($elems:expr,)*] [$($array:tt)*] $($rest:tt)*) => {
        blob_internal!(@array [$($elems,)* blob_internal!([$($array)*])] $($rest)*)
    };

    (@array [$($elems:expr,)*] {$($map:tt)*} $($rest:tt)*) => {
        blob_internal!(@array [$($elems,)* blob_internal!({$($map)*})] $($rest)*)
    };

    (@array [$($elems:expr,)*] $next:expr, $($rest:tt)*) => {
        blob_internal!(@array [$($elems,)* blob_internal!($next),] $($rest)*)
    };

    (@array [$($elems:expr,)*] $last:expr) => {
        blob_internal!(@array [$($elems,)* blob_internal!($last)])
    };

    (@array [$($elems:expr),*] , $($rest:tt)*) => {
        blob_internal!(@array [$($elems,)*] $($rest)*)
    };

    // Map contents, inserted into `$map`: blob_internal!(@map $map () ($($tt)*))
    // A key is munched token by token inside (...), then moved into [...] once its value is known.
    (@map $map:ident () ()) => {};

    (@map $map:ident [$($key:tt)+] ($value:expr) , $($rest:tt)*) => {
        let _ = $map.insert(($($key)+).into(), $value);
        blob_internal!(@map $map () ($($rest)*));
    };

    (@map $map:ident [$($key:tt)+] ($value:expr)) => {
        let _ = $map.insert(($($key)+).into(), $value);
    };

    (@map $map:ident ($($key:tt)+) (: null $($rest:tt)*)) => {
        blob_internal!(@map $map [$($key)+] (blob_internal!(null)) $($rest)*);
    };

    (@map $map:ident ($($key:tt)+) (: [$($array:tt)*] $($rest:tt)*)) => {
        blob_internal!(@map $map [$($key)+] (blob_internal!([$($array)*])) $($rest)*);
    };

    (@map $map:ident ($($key:tt)+) (: {$($inner:tt)*} $($rest:tt)*)) => {
        blob_internal!(@map $map [$($key)+] (blob_internal!({$($inner)*})) $($rest)*);
    };

    (@map $map:ident ($($key:tt)+) (: $value:expr , $($rest:tt)*)) => {
        blob_internal!(@map $map [$($key)+] (blob_internal!($value)) , $($rest)*);
    };

    (@map $map:ident ($($key:tt)+) (: $value:expr)) => {
        blob_internal!(@map $map [$($key)+] (blob_internal!($value)));
    };

    (@map $map:ident ($($key:tt)*) ($tt:tt $($rest:tt)*)) => {
        blob_internal!(@map $map ($($key)* $tt) ($($rest)*));
    };

    // Single values.
    (null) => {
        $crate::Value::Null
    };

    ([]) => {
        $crate::Value::Array(blob_internal_vec![])
    };

    ([ $($tt:tt)+ ]) => {
        $crate::Value::Array(blob_internal!(@array [] $($tt)+))
    };

    ({}) => {
        $crate::Value::Map($crate::value::Map::new())
    };

    ({ $($tt:tt)+ }) => {
        $crate::Value::Map({
            let mut map = $crate::value::Map::new();
            blob_internal!(@map map () ($($tt)+));
            map
        })
    };

    // Anything else goes through `Into<Value>`, so this must stay last.
    ($other:expr) => {
        $crate::Value::from($other)
    };
}

// `vec!` can't be named inside a local_inner_macros macro without resolving to $crate::vec.
#[macro_export]
#[doc(hidden)]
macro_rules! blob_internal_vec {
    ($($content:tt)*) => {
        vec![$($content)*]
    };
}

#[cfg(test)]
mod test {
    use crate::Value;

    #[test]
    fn nested_literal() {
        let level = 2;
        let v = blob!({
            "kind": "SubEvent",
            "items": [
                { "message": format!("level {}", level), "flag": true },
                null,
                [1, 2.5],
            ],
        });
        assert_eq!(v["kind"], Value::from("SubEvent"));
        assert_eq!(v["items"][0]["message"], Value::from("level 2"));
        assert_eq!(v["items"][0]["flag"], Value::Bool(true));
        assert!(v["items"][1].is_null());
        assert_eq!(v["items"][2][1], Value::F64(2.5));
        let keys: Vec<&String> = v.as_map().unwrap().keys().collect();
        assert_eq!(keys, ["kind", "items"]);
    }
}
