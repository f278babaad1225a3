use quickcheck::Arbitrary;
use serde_json::{Map, Number, Value};
use std::ops::Range;

/// A generated document. Doubles are drawn from a dyadic family whose
/// shortest decimal forms stay well inside the mantissa and exponent
/// ranges that convert exactly, so serialized output re-parses to the
/// identical bits everywhere.
#[derive(Clone, Debug)]
pub struct ArbitraryValue(pub Value);

impl Arbitrary for ArbitraryValue {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self(gen_value(g, 8))
    }
}

fn gen_range(g: &mut quickcheck::Gen, range: Range<u64>) -> u64 {
    u64::arbitrary(g) % (range.end - range.start) + range.start
}

fn gen_value(g: &mut quickcheck::Gen, n: usize) -> Value {
    match gen_range(g, 0..if n != 0 { 8 } else { 6 }) {
        0 => Value::Null,
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::Number(Number::from(i64::arbitrary(g))),
        3 => Value::Number(Number::from(u64::arbitrary(g))),
        4 => {
            let mantissa = i32::arbitrary(g) as f64;
            let scale = (1u64 << gen_range(g, 0..9)) as f64;
            Value::Number(
                Number::from_f64(mantissa / scale).unwrap_or_else(|| Number::from(0)),
            )
        }
        5 => Value::String(String::arbitrary(g)),
        6 => Value::Array(gen_array(g, n / 2)),
        7 => Value::Object(gen_map(g, n / 2)),
        _ => unreachable!(),
    }
}

fn gen_array(g: &mut quickcheck::Gen, n: usize) -> Vec<Value> {
    (0..gen_range(g, 0..(n as u64) + 3))
        .map(|_| gen_value(g, n))
        .collect()
}

fn gen_map(g: &mut quickcheck::Gen, n: usize) -> Map<String, Value> {
    (0..gen_range(g, 0..(n as u64) + 3))
        .map(|_| (String::arbitrary(g), gen_value(g, n)))
        .collect()
}
