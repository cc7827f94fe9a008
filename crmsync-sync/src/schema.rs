//! Static per-entity column schemas.
//!
//! A schema is the single description of an entity collection: where it
//! lives remotely, how it paginates, how remote fields project onto local
//! columns, which columns are timestamps, and what the local table looks
//! like. Statements are built from the column list, never from whatever
//! keys a record happens to carry.

use crate::error::{SyncError, SyncResult};
use crmsync_store::StoreSession;
use crmsync_types::{EntityKind, ScalarValue, ID_FIELD};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
    /// Text in `YYYY-MM-DD HH:MM:SS`, canonicalized by the normalizer.
    Timestamp,
}

impl ColumnType {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Text | ColumnType::Timestamp => "TEXT",
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
        }
    }
}

/// One local column and the remote field it is projected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub remote_key: &'static str,
    pub ty: ColumnType,
}

impl Column {
    const fn new(name: &'static str, remote_key: &'static str, ty: ColumnType) -> Self {
        Self { name, remote_key, ty }
    }

    /// Converts a canonical value into the representation this column stores.
    ///
    /// Ids and other text columns keep their textual form whatever the
    /// remote sent; boolean columns accept `"true"`/`"false"`.
    pub fn bind(&self, value: &ScalarValue) -> ScalarValue {
        match (self.ty, value) {
            (_, ScalarValue::Null) => ScalarValue::Null,
            (ColumnType::Text | ColumnType::Timestamp, ScalarValue::Text(_)) => value.clone(),
            (ColumnType::Text | ColumnType::Timestamp, other) => ScalarValue::Text(other.to_string()),
            (ColumnType::Boolean, ScalarValue::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => ScalarValue::Bool(true),
                "false" | "0" => ScalarValue::Bool(false),
                _ => value.clone(),
            },
            (ColumnType::Integer, ScalarValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(ScalarValue::Integer)
                .unwrap_or_else(|_| value.clone()),
            _ => value.clone(),
        }
    }
}

/// How a collection is paged by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Opaque `page_token` returned in `info.next_page_token`.
    Token,
    /// 1-based `page` query parameter.
    PageNumber,
    /// Everything arrives in one response.
    Single,
}

/// Static description of one entity collection.
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub table: &'static str,
    pub endpoint: &'static str,
    /// Key of the record array in the response body.
    pub records_key: &'static str,
    pub pagination: Pagination,
    /// Default page-count guard.
    pub max_pages: u32,
    /// Query parameters sent with every page request.
    pub query: &'static [(&'static str, &'static str)],
    /// Whether requests carry a `fields=` projection.
    pub project_fields: bool,
    pub columns: &'static [Column],
}

use ColumnType::{Boolean, Text, Timestamp};

const LEAD_COLUMNS: &[Column] = &[
    Column::new("id", "id", Text),
    Column::new("last_name", "Last_Name", Text),
    Column::new("company", "Company", Text),
    Column::new("owner", "Owner", Text),
    Column::new("email", "Email", Text),
    Column::new("mobile", "Mobile", Text),
    Column::new("lead_source", "Lead_Source", Text),
    Column::new("lead_status", "Lead_Status", Text),
    Column::new("created_at", "Created_Time", Timestamp),
    Column::new("converted", "$converted", Boolean),
    Column::new("first_name", "First_Name", Text),
    Column::new("phone", "Phone", Text),
    Column::new("created_by", "Created_By", Text),
    Column::new("modified_by", "Modified_By", Text),
    Column::new("modified_at", "Modified_Time", Timestamp),
    Column::new("street", "Street", Text),
    Column::new("city", "City", Text),
    Column::new("state", "State", Text),
    Column::new("zip_code", "Zip_Code", Text),
    Column::new("country", "Country", Text),
    Column::new("last_activity_at", "Last_Activity_Time", Timestamp),
    Column::new("fiscal_number", "C_I_RUC", Text),
    Column::new("birthday", "Fecha_de_Nacimiento", Text),
    Column::new("interested_in", "Interesado_en", Text),
    Column::new("contact_type", "Tipo_de_Contacto", Text),
    Column::new("campaign", "Campa_a_Digital", Text),
    Column::new("occupation", "Profesi_n", Text),
    Column::new("gender", "Genero", Text),
    Column::new("customer_type", "Tipo_de_Cliente", Text),
];

const USER_COLUMNS: &[Column] = &[
    Column::new("id", "id", Text),
    Column::new("first_name", "first_name", Text),
    Column::new("last_name", "last_name", Text),
    Column::new("email", "email", Text),
    Column::new("full_name", "full_name", Text),
    Column::new("status", "status", Text),
];

const ROLE_COLUMNS: &[Column] = &[
    Column::new("id", "id", Text),
    Column::new("name", "name", Text),
];

pub static LEADS: EntitySchema = EntitySchema {
    kind: EntityKind::Leads,
    table: "leads",
    endpoint: "/crm/v3/Leads",
    records_key: "data",
    pagination: Pagination::Token,
    max_pages: 500,
    query: &[("sort_order", "desc"), ("sort_by", "id")],
    project_fields: true,
    columns: LEAD_COLUMNS,
};

pub static USERS: EntitySchema = EntitySchema {
    kind: EntityKind::Users,
    table: "users",
    endpoint: "/crm/v3/users",
    records_key: "users",
    pagination: Pagination::PageNumber,
    max_pages: 10,
    query: &[("type", "AllUsers")],
    project_fields: false,
    columns: USER_COLUMNS,
};

pub static ROLES: EntitySchema = EntitySchema {
    kind: EntityKind::Roles,
    table: "roles",
    endpoint: "/crm/v3/settings/roles",
    records_key: "roles",
    pagination: Pagination::Single,
    max_pages: 10,
    query: &[],
    project_fields: false,
    columns: ROLE_COLUMNS,
};

impl EntitySchema {
    pub fn for_kind(kind: EntityKind) -> &'static EntitySchema {
        match kind {
            EntityKind::Leads => &LEADS,
            EntityKind::Users => &USERS,
            EntityKind::Roles => &ROLES,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn timestamp_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| c.ty == ColumnType::Timestamp)
    }

    /// Comma-separated remote field names for the `fields=` projection.
    pub fn remote_fields(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.remote_key)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Resolves every name to its column, failing on the first unknown one.
    pub fn resolve<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> SyncResult<Vec<&'static Column>> {
        names
            .into_iter()
            .map(|name| {
                self.column(name).ok_or_else(|| {
                    SyncError::Schema(format!("{} has no column named '{name}'", self.table))
                })
            })
            .collect()
    }

    pub fn create_table_sql(&self) -> String {
        let mut columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.name == ID_FIELD {
                    format!("{} TEXT PRIMARY KEY", c.name)
                } else {
                    format!("{} {}", c.name, c.ty.sql_type())
                }
            })
            .collect();
        columns.push("deleted INTEGER NOT NULL DEFAULT 0".to_string());
        columns.push("source_deleted INTEGER NOT NULL DEFAULT 0".to_string());
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.table,
            columns.join(",\n    ")
        )
    }

    /// Selects live (not soft-deleted) rows, columns in schema order.
    pub fn select_live_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        format!(
            "SELECT {} FROM {} WHERE deleted = 0 ORDER BY rowid",
            names.join(", "),
            self.table
        )
    }

    /// Creates the entity table if it does not exist yet.
    pub fn ensure_table<S: StoreSession + ?Sized>(&self, session: &S) -> SyncResult<()> {
        session.execute_batch(&self.create_table_sql())?;
        Ok(())
    }
}
