use thiserror::Error;

/// UnknownVariant
///
/// Raised when a stored or submitted string does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// string_enum!
///
/// Declares a closed set of upper-case string constants. Values travel as plain
/// strings on the wire and in TEXT columns, so each enum gets serde renames,
/// `FromStr`, `Display` and the `TryFrom<String>` conversion used by
/// `#[sqlx(try_from = "String")]`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            ::serde::Serialize, ::serde::Deserialize, ::ts_rs::TS, ::utoipa::ToSchema,
        )]
        #[ts(export)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod api;
pub mod application;
pub mod environment;
pub mod log;
pub mod member;
pub mod metadata;
pub mod plan;
pub mod role;
pub mod subscription;
pub mod user;

pub use api::*;
pub use application::*;
pub use environment::*;
pub use log::*;
pub use member::*;
pub use metadata::*;
pub use plan::*;
pub use role::*;
pub use subscription::*;
pub use user::*;
