use serde_json::Value;

const TWO_32: f64 = 4_294_967_296.0;
const TWO_31: f64 = 2_147_483_648.0;

/// Convert a listener's return value to the VM's native integer width, with
/// ECMAScript `ToInt32` semantics.
pub fn to_int32(value: &Value) -> i32 {
    match value {
        Value::Null | Value::Object(_) => 0,
        Value::Bool(b) => i32::from(*b),
        Value::Number(n) => match n.as_i64() {
            // Truncation to the low 32 bits is exactly modulo 2^32.
            Some(i) => i as i32,
            None => n.as_f64().map_or(0, f64_to_int32),
        },
        Value::String(s) => string_to_number(s).map_or(0, f64_to_int32),
        // An array converts through its string form, so only a lone
        // number-like element survives.
        Value::Array(items) => match items.as_slice() {
            [single @ (Value::Number(_) | Value::String(_) | Value::Array(_))] => to_int32(single),
            _ => 0,
        },
    }
}

fn f64_to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    let wrapped = value.trunc().rem_euclid(TWO_32);
    if wrapped >= TWO_31 {
        (wrapped - TWO_32) as i32
    } else {
        wrapped as i32
    }
}

/// ECMAScript `StringToNumber`. `None` stands for NaN.
fn string_to_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let bytes = trimmed.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' {
        let radix = match bytes[1] {
            b'x' | b'X' => Some(16),
            b'o' | b'O' => Some(8),
            b'b' | b'B' => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return parse_radix(&trimmed[2..], radix);
        }
    }

    let unsigned = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed);
    if unsigned == "Infinity" {
        return Some(if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    // Only decimal literals from here; the float parser would also take
    // "inf" and "nan", which are not numbers here.
    let decimal = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal || !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Unsigned digits in `radix`, no sign, of any length.
fn parse_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix)
            .map(|d| acc.mul_add(f64::from(radix), f64::from(d)))
    })
}
