//! Shared domain enums stored as text columns

use serde::{Deserialize, Serialize};
use sqlx::{
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, Postgres,
};
use utoipa::ToSchema;

/// Implements string conversions and the Postgres text codec for a unit enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($name), s))
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as Decode<Postgres>>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Cover
// ---------------------------------------------------------------------------

/// Book binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cover {
    Hard,
    Soft,
}

text_enum!(Cover {
    Hard => "HARD",
    Soft => "SOFT",
});

// ---------------------------------------------------------------------------
// Payment status / type
// ---------------------------------------------------------------------------

/// Payment lifecycle. `Pending -> Paid` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

text_enum!(PaymentStatus {
    Pending => "PENDING",
    Paid => "PAID",
});

/// What a payment is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    /// Rental fee for the reserved period
    Payment,
    /// Penalty for a late return
    Fine,
}

text_enum!(PaymentType {
    Payment => "PAYMENT",
    Fine => "FINE",
});

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// User role checked by the access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Admin,
}

text_enum!(Role {
    Reader => "reader",
    Admin => "admin",
});

impl Default for Role {
    fn default() -> Self {
        Role::Reader
    }
}
