/// Value storage for formats that hold one string per unit.
///
/// In template mode the value is source text and the unit has no target;
/// otherwise the value is the translation and doubles as the source.
use crate::multistring::Multistring;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub text: String,
    pub template: bool,
    /// Kept in memory only; these formats have no obsolete marker.
    pub obsolete: bool,
}

impl Value {
    pub fn new(text: impl Into<String>, template: bool) -> Self {
        Self {
            text: text.into(),
            template,
            obsolete: false,
        }
    }

    pub fn source(&self) -> Multistring {
        Multistring::from(self.text.as_str())
    }

    pub fn set_source(&mut self, source: Multistring) {
        self.text = source.as_str().to_string();
    }

    pub fn target(&self) -> Option<Multistring> {
        if self.template {
            None
        } else {
            Some(Multistring::from(self.text.as_str()))
        }
    }

    pub fn set_target(&mut self, target: Option<Multistring>) {
        match target {
            Some(value) => {
                self.text = value.as_str().to_string();
                self.template = false;
            }
            None => self.template = true,
        }
    }
}

/// Implements the value, obsolete and error accessors of `TranslationUnit`
/// for a unit with `value: Value` and `errors: UnitErrors` fields.
macro_rules! monolingual_unit_methods {
    () => {
        fn source(&self) -> $crate::multistring::Multistring {
            self.value.source()
        }

        fn set_source(&mut self, source: $crate::multistring::Multistring) {
            self.value.set_source(source)
        }

        fn target(&self) -> Option<$crate::multistring::Multistring> {
            self.value.target()
        }

        fn set_target(&mut self, target: Option<$crate::multistring::Multistring>) {
            self.value.set_target(target)
        }

        fn is_obsolete(&self) -> bool {
            self.value.obsolete
        }

        fn make_obsolete(&mut self) {
            self.value.obsolete = true;
        }

        fn resurrect(&mut self) {
            self.value.obsolete = false;
        }

        fn add_error(&mut self, name: &str, message: &str) {
            self.errors.insert(name.to_string(), message.to_string());
        }

        fn errors(&self) -> $crate::unit::UnitErrors {
            self.errors.clone()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_values_have_no_target() {
        let value = Value::new("Open", true);
        assert_eq!(value.source(), "Open");
        assert!(value.target().is_none());
    }

    #[test]
    fn setting_target_leaves_template_mode() {
        let mut value = Value::new("Open", true);
        value.set_target(Some("Oop".into()));
        assert!(!value.template);
        assert_eq!(value.target().unwrap(), "Oop");
        assert_eq!(value.source(), "Oop");
    }

    #[test]
    fn plural_values_degrade_to_first_form() {
        let mut value = Value::new("", false);
        value.set_target(Some(Multistring::plural(["one", "many"])));
        assert_eq!(value.text, "one");
    }
}
