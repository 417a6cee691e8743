use crate::{error::QueryError, vault::Vault};
use regex::Regex;
use serde::Serialize;
use std::{fmt, sync::LazyLock};

static ORDER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{Alphabetic}_$\x{E000}][\w$.\x{E000}-\x{E002}\[\]]*$").expect("order path pattern is valid")
});

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

///
/// OrderItem
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OrderItem {
    pub path: String,
    pub direction: OrderDirection,
}

///
/// OrderClause
///
/// Validated `order by` clause. Parsed and returned to the caller; the
/// compiler never sorts.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OrderClause {
    pub items: Vec<OrderItem>,
}

impl OrderClause {
    /// Parse `path [asc|desc], ...`. Quoted path segments are restored from
    /// the vault.
    pub(crate) fn parse(clause: &str, vault: &Vault) -> Result<Self, QueryError> {
        let mut items = Vec::new();

        for item in clause.split(',') {
            let words: Vec<&str> = item.split_whitespace().collect();
            let (path, direction) = match words.as_slice() {
                [path] => (*path, OrderDirection::Asc),
                [path, direction] => (*path, parse_direction(direction)?),
                _ => return Err(QueryError::Ordering),
            };
            if !ORDER_PATH.is_match(path) {
                return Err(QueryError::Ordering);
            }

            items.push(OrderItem {
                path: vault.restore(path),
                direction,
            });
        }

        Ok(Self { items })
    }
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", item.path, item.direction)?;
        }

        Ok(())
    }
}

fn parse_direction(text: &str) -> Result<OrderDirection, QueryError> {
    if text.eq_ignore_ascii_case("asc") {
        Ok(OrderDirection::Asc)
    } else if text.eq_ignore_ascii_case("desc") {
        Ok(OrderDirection::Desc)
    } else {
        Err(QueryError::Ordering)
    }
}
