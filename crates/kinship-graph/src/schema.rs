//! Predicate and type declarations, and the alter operations that apply or drop them.

use crate::client::{GraphClient, GraphError};
use crate::transport::{Operation, Transport};

/// Schema for person, location and institution records. Sent verbatim.
pub const SCHEMA: &str = r#"
name: string @index(exact) .
age: int .
married: bool .
loc: geo .
dob: datetime .
raw_bytes: default .
friends: [uid] .
school: [uid] .
type: string @index(exact) .
coords: [float] .

type Person {
    name
    age
    dob
    married
    raw_bytes
    friends
    loc
    school
}

type Loc {
    type
    coords
}

type Institution {
    name
}
"#;

impl<T: Transport> GraphClient<T> {
    /// Create or update the schema.
    pub async fn apply_schema(&self) -> Result<(), GraphError> {
        self.apply_schema_text(SCHEMA).await
    }

    /// Create or update the schema from caller-supplied text.
    pub async fn apply_schema_text(&self, schema: &str) -> Result<(), GraphError> {
        self.alter(&Operation::Schema(schema.to_string())).await?;
        tracing::info!(bytes = schema.len(), "Schema applied");
        Ok(())
    }

    /// Delete all data, keeping the schema.
    pub async fn drop_data(&self) -> Result<(), GraphError> {
        self.alter(&Operation::DropData).await?;
        tracing::info!("Dropped all data");
        Ok(())
    }

    /// Delete all data and the schema.
    pub async fn drop_all(&self) -> Result<(), GraphError> {
        self.alter(&Operation::DropAll).await?;
        tracing::info!("Dropped data and schema");
        Ok(())
    }
}
