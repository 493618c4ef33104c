//! Иерархия блокируемых объектов
//!
//! База данных → Таблица → Строка → Ячейка. Каждый объект знает своего
//! родителя, поэтому от любого узла можно подняться до корня.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Часть первичного ключа
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyPart {
    /// Целочисленное значение
    Integer(i64),
    /// Строковое значение
    Text(String),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Integer(v) => write!(f, "{}", v),
            KeyPart::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        KeyPart::Integer(v)
    }
}

impl From<i32> for KeyPart {
    fn from(v: i32) -> Self {
        KeyPart::Integer(v as i64)
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        KeyPart::Text(v.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(v: String) -> Self {
        KeyPart::Text(v)
    }
}

/// Первичный ключ строки; составной ключ сравнивается как упорядоченный кортеж
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey(pub Vec<KeyPart>);

impl PrimaryKey {
    /// Ключ из одной колонки
    pub fn single(part: impl Into<KeyPart>) -> Self {
        Self(vec![part.into()])
    }

    /// Составной ключ
    pub fn composite<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

macro_rules! single_column_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PrimaryKey {
                fn from(part: $ty) -> Self {
                    PrimaryKey::single(part)
                }
            }
        )*
    };
}

single_column_key!(i64, i32, &str, String, KeyPart);

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, ")")
    }
}

/// Уровень иерархии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Database,
    Table,
    Row,
    Cell,
}

/// Блокируемый объект.
///
/// Равенство и хеш определяются вариантом и идентифицирующими полями,
/// поэтому объект можно строить заново из пользовательских идентификаторов
/// и использовать как ключ таблицы блокировок.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataItem {
    /// Вся база данных
    Database,
    /// Таблица
    Table { table: String },
    /// Строка таблицы
    Row { table: String, key: PrimaryKey },
    /// Ячейка строки
    Cell {
        table: String,
        key: PrimaryKey,
        column: String,
    },
}

impl DataItem {
    pub fn database() -> Self {
        DataItem::Database
    }

    pub fn table(table: impl Into<String>) -> Self {
        DataItem::Table {
            table: table.into(),
        }
    }

    pub fn row(table: impl Into<String>, key: impl Into<PrimaryKey>) -> Self {
        DataItem::Row {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn cell(
        table: impl Into<String>,
        key: impl Into<PrimaryKey>,
        column: impl Into<String>,
    ) -> Self {
        DataItem::Cell {
            table: table.into(),
            key: key.into(),
            column: column.into(),
        }
    }

    /// Следующий, более крупный объект; `None` для базы данных
    pub fn parent(&self) -> Option<DataItem> {
        match self {
            DataItem::Database => None,
            DataItem::Table { .. } => Some(DataItem::Database),
            DataItem::Row { table, .. } => Some(DataItem::Table {
                table: table.clone(),
            }),
            DataItem::Cell { table, key, .. } => Some(DataItem::Row {
                table: table.clone(),
                key: key.clone(),
            }),
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            DataItem::Database => Granularity::Database,
            DataItem::Table { .. } => Granularity::Table,
            DataItem::Row { .. } => Granularity::Row,
            DataItem::Cell { .. } => Granularity::Cell,
        }
    }

    /// Цепочка от корня до самого объекта включительно
    pub fn path_from_root(&self) -> Vec<DataItem> {
        let mut path = vec![self.clone()];
        let mut current = self.parent();
        while let Some(item) = current {
            current = item.parent();
            path.push(item);
        }
        path.reverse();
        path
    }

    /// Является ли `self` строгим предком `other`
    pub fn is_ancestor_of(&self, other: &DataItem) -> bool {
        let mut current = other.parent();
        while let Some(item) = current {
            if &item == self {
                return true;
            }
            current = item.parent();
        }
        false
    }
}

impl fmt::Display for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataItem::Database => write!(f, "Database"),
            DataItem::Table { table } => write!(f, "Table({})", table),
            DataItem::Row { table, key } => write!(f, "Row({}{})", table, key),
            DataItem::Cell { table, key, column } => {
                write!(f, "Cell({}{}.{})", table, key, column)
            }
        }
    }
}
