use crate::infrastructure::schema::{EntityShapes, ShapeDescriptor};
use crate::infrastructure::store::{RelationalStore, StoreError};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeResolution {
    Matched(ShapeDescriptor),
    NoMatch { entity: String, tried: Vec<String> },
}

/// Probes candidate shapes in order. Probes are read-only and safe to repeat.
pub struct SchemaResolver;

impl SchemaResolver {
    /// Returns the first candidate whose probe succeeds.
    ///
    /// Only schema-absence failures move on to the next candidate; any other
    /// probe failure is returned as-is.
    pub async fn resolve<R: RelationalStore + ?Sized>(
        store: &R,
        shapes: &EntityShapes,
    ) -> Result<ShapeResolution, StoreError> {
        let mut tried = Vec::with_capacity(shapes.candidates().len());
        for candidate in shapes.candidates() {
            let columns = candidate.physical_columns(shapes.columns());
            match store.probe(&candidate.table, &columns).await {
                Ok(()) => {
                    debug!("{} resolved to table {}", shapes.entity(), candidate.table);
                    return Ok(ShapeResolution::Matched(candidate.clone()));
                }
                Err(err) if err.is_schema_absence() => {
                    debug!("{} candidate {} rejected: {}", shapes.entity(), candidate.table, err);
                    tried.push(candidate.table.clone());
                }
                Err(err) => return Err(err),
            }
        }
        warn!("no table shape matched for {} (tried {:?})", shapes.entity(), tried);
        Ok(ShapeResolution::NoMatch {
            entity: shapes.entity().to_string(),
            tried,
        })
    }
}
