use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub enum ScalarType {
    ID,
    String,
    Int,
    BigInt,
    Float,
    Boolean,
    DateTime,
    Enum(String),
}

impl ScalarType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::BigInt | ScalarType::Float)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ScalarType::ID | ScalarType::String)
    }

    /// Types supporting `<`, `<=`, `>`, `>=`.
    pub fn is_orderable(&self) -> bool {
        self.is_numeric() || self.is_textual() || matches!(self, ScalarType::DateTime)
    }
}

/// The write operations a generated value is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOperation {
    Create,
    Update,
}

/// A value computed by an externally supplied callback when the node is written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedBy {
    pub callback: String,
    #[serde(default = "PopulatedBy::all_operations")]
    pub operations: Vec<WriteOperation>,
}

impl PopulatedBy {
    fn all_operations() -> Vec<WriteOperation> {
        vec![WriteOperation::Create, WriteOperation::Update]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarField {
    pub name: String,
    /// Storage property name when it differs from the exposed field name.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub type_identifier: ScalarType,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    /// Read-only field computed by a statement run against the owning node, bound as `this`.
    #[serde(default)]
    pub custom_statement: Option<String>,
    #[serde(default)]
    pub populated_by: Option<PopulatedBy>,
    #[serde(default)]
    pub timestamps: Vec<WriteOperation>,
}

impl ScalarField {
    pub fn new(name: impl Into<String>, type_identifier: ScalarType) -> Self {
        ScalarField {
            name: name.into(),
            alias: None,
            type_identifier,
            is_list: false,
            is_required: false,
            is_unique: false,
            custom_statement: None,
            populated_by: None,
            timestamps: Vec::new(),
        }
    }

    /// The property name in the database.
    pub fn db_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_computed(&self) -> bool {
        self.custom_statement.is_some()
    }

    pub fn callback_for(&self, operation: WriteOperation) -> Option<&str> {
        self.populated_by
            .as_ref()
            .filter(|p| p.operations.contains(&operation))
            .map(|p| p.callback.as_str())
    }

    pub fn has_timestamp_for(&self, operation: WriteOperation) -> bool {
        self.timestamps.contains(&operation)
    }

    /// Values of generated fields are never supplied by clients.
    pub fn is_generated(&self) -> bool {
        self.populated_by.is_some() || !self.timestamps.is_empty()
    }
}
