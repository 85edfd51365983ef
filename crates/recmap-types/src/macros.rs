//! Declaration macros for mappable types.

/// Implement [`Entity`](crate::Entity), [`IntoValue`](crate::IntoValue) and
/// [`FromValue`](crate::FromValue) for a struct by listing its mapped fields.
///
/// Every listed field's type must implement `IntoValue + FromValue`. Fields
/// not listed are invisible to the mapper and keep their `Default` value on
/// hydration.
///
/// ```ignore
/// #[derive(Clone, Debug, Default)]
/// struct Person { id: String, age: i32 }
///
/// recmap_types::entity!(Person { id, age });
/// ```
#[macro_export]
macro_rules! entity {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Entity for $ty {
            fn class_id(&self) -> $crate::ClassId {
                $crate::ClassId::of::<$ty>()
            }

            fn get_field(&self, name: &str) -> ::core::option::Option<$crate::Value> {
                match name {
                    $(stringify!($field) => ::core::option::Option::Some(
                        $crate::IntoValue::to_value(&self.$field),
                    ),)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                name: &str,
                value: $crate::Value,
            ) -> $crate::ValueResult<()> {
                match name {
                    $(stringify!($field) => {
                        self.$field = $crate::FromValue::from_value(value)?;
                        ::core::result::Result::Ok(())
                    })*
                    _ => ::core::result::Result::Err($crate::ValueError::UnknownField(
                        name.to_string(),
                    )),
                }
            }

            fn clone_entity(&self) -> ::std::boxed::Box<dyn $crate::Entity> {
                ::std::boxed::Box::new(::core::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::core::any::Any> {
                self
            }
        }

        impl $crate::IntoValue for $ty {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::Object(::std::boxed::Box::new(::core::clone::Clone::clone(self)))
            }
        }

        impl $crate::FromValue for $ty {
            fn from_value(value: $crate::Value) -> $crate::ValueResult<Self> {
                value.into_entity::<$ty>()
            }
        }
    };
}

/// Implement [`IntoValue`](crate::IntoValue) and
/// [`FromValue`](crate::FromValue) for a fieldless enum, storing each
/// variant by name.
///
/// ```ignore
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// enum Color { #[default] Red, Green }
///
/// recmap_types::value_enum!(Color { Red, Green });
/// ```
#[macro_export]
macro_rules! value_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::IntoValue for $ty {
            fn to_value(&self) -> $crate::Value {
                match self {
                    $(Self::$variant => $crate::Value::Enum(stringify!($variant).to_string()),)+
                }
            }
        }

        impl $crate::FromValue for $ty {
            fn from_value(value: $crate::Value) -> $crate::ValueResult<Self> {
                match value {
                    $crate::Value::Enum(name) | $crate::Value::Text(name) => match name.as_str() {
                        $(stringify!($variant) => ::core::result::Result::Ok(Self::$variant),)+
                        _ => ::core::result::Result::Err($crate::ValueError::UnknownVariant {
                            enum_name: stringify!($ty),
                            variant: name,
                        }),
                    },
                    other => ::core::result::Result::Err($crate::ValueError::mismatch("enum", &other)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{FromValue, IntoValue, Value, ValueError};

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    enum Color {
        #[default]
        Red,
        Green,
    }

    crate::value_enum!(Color { Red, Green });

    #[derive(Clone, Debug, Default)]
    struct Empty;

    crate::entity!(Empty {});

    #[test]
    fn enum_variants_by_name() {
        assert!(matches!(Color::Green.to_value(), Value::Enum(ref n) if n == "Green"));
        assert_eq!(Color::from_value(Value::Enum("Red".into())).unwrap(), Color::Red);
    }

    #[test]
    fn enum_unknown_variant() {
        let err = Color::from_value(Value::Enum("Blue".into())).unwrap_err();
        assert_eq!(
            err,
            ValueError::UnknownVariant {
                enum_name: "Color",
                variant: "Blue".into()
            }
        );
    }

    #[test]
    fn fieldless_entity_has_no_fields() {
        use crate::Entity;
        let mut empty = Empty;
        assert!(empty.get_field("anything").is_none());
        assert!(empty.set_field("anything", Value::Null).is_err());
    }
}
