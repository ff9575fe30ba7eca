use serde_json::Value;

use super::Callable;

/// One argument handed to a listener.
///
/// Engine-to-engine fires pass these through untouched, so a function given to
/// `fire` reaches every listener as the same [`Callable`].
#[derive(Debug, Clone)]
pub enum Argument {
    Value(Value),
    Function(Callable),
    List(Vec<Argument>),
}

impl Argument {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_function(&self) -> Option<&Callable> {
        match self {
            Argument::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Argument]> {
        match self {
            Argument::List(items) => Some(items),
            _ => None,
        }
    }

    /// Plain value form. Functions have none and become null.
    pub fn to_value(&self) -> Value {
        match self {
            Argument::Value(v) => v.clone(),
            Argument::Function(_) => Value::Null,
            Argument::List(items) => Value::Array(items.iter().map(Argument::to_value).collect()),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Value(Value::String(value.to_string()))
    }
}

impl From<Callable> for Argument {
    fn from(value: Callable) -> Self {
        Argument::Function(value)
    }
}

impl From<Vec<Argument>> for Argument {
    fn from(items: Vec<Argument>) -> Self {
        Argument::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_match_variant() {
        let f = Callable::new(0u8);
        let list = Argument::List(vec!["x".into(), f.clone().into()]);

        assert_eq!(Argument::from("name").as_str(), Some("name"));
        assert!(Argument::from(json!(1)).as_str().is_none());
        assert!(Argument::from(f.clone()).as_function().unwrap().is_same(&f));
        assert_eq!(list.as_list().map(<[Argument]>::len), Some(2));
        assert!(list.as_value().is_none());
    }

    #[test]
    fn value_form_nulls_functions() {
        let list = Argument::List(vec![json!(1).into(), Callable::new(0u8).into()]);
        assert_eq!(list.to_value(), json!([1, null]));
    }
}
