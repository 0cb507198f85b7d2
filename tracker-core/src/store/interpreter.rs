//! Statement interpreter: the entry point for one `STATEMENTS` batch.
//! Resolves class/property URIs against the registry, applies domain and
//! cardinality checks, and drives the [`UpdateBuffer`], swallowing
//! statement-local errors (per [`TrackerError::is_statement_local`]) so one
//! bad statement doesn't abort the rest of the batch.

use crate::error::{Result, TrackerError};
use crate::ontology::registry::{ClassId, PropertyId, Registry};
use crate::store::resource::ResourceAllocator;
use crate::store::update_buffer::UpdateBuffer;
use crate::value::Value;
use crate::writeback::WritebackDispatcher;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum Object {
    Uri(String),
    Literal(String),
}

#[derive(Debug, Clone)]
pub enum Statement {
    /// `<subject> a <class> .`
    InsertType { subject: String, class: String },
    /// `<subject> <property> <object> .`
    InsertValue {
        subject: String,
        property: String,
        object: Object,
    },
    DeleteValue {
        subject: String,
        property: String,
        object: Option<Object>,
    },
    DeleteSubject { subject: String },
    UpdateUri { old: String, new: String },
}

/// Outcome of interpreting one batch: how many statements applied cleanly
/// versus were rejected as statement-local errors (logged, not fatal).
#[derive(Debug, Default)]
pub struct BatchReport {
    pub applied: usize,
    pub rejected: Vec<(Statement, TrackerError)>,
}

pub struct Interpreter<'a> {
    registry: Arc<Registry>,
    buffer: UpdateBuffer<'a>,
    seen_single_valued: HashMap<(i64, PropertyId), Value>,
    writeback: Option<Arc<WritebackDispatcher>>,
}

impl<'a> Interpreter<'a> {
    pub async fn begin(
        pool: &'a SqlitePool,
        registry: Arc<Registry>,
        allocator: Arc<ResourceAllocator>,
    ) -> Result<Self> {
        Ok(Self {
            registry: registry.clone(),
            buffer: UpdateBuffer::begin(pool, registry, allocator).await?,
            seen_single_valued: HashMap::new(),
            writeback: None,
        })
    }

    /// Attaches a writeback dispatcher: every successful `InsertValue`
    /// this batch applies is also offered to it, so predicates configured
    /// for writeback get stamped back into the source file. Only the
    /// files miner's own batches need this; volume/application batches
    /// never assert writeback-eligible predicates, so they leave it unset.
    pub fn with_writeback(mut self, dispatcher: Arc<WritebackDispatcher>) -> Self {
        self.writeback = Some(dispatcher);
        self
    }

    /// Applies every statement in the batch, in order, collecting
    /// statement-local failures instead of aborting, then commits.
    pub async fn run(mut self, statements: &[Statement]) -> Result<BatchReport> {
        // Blank subjects must have every predicate/object pair recorded
        // before the first attempt to resolve their id, so the coalescing
        // hash sees the full set regardless of statement order within the
        // batch.
        for stmt in statements {
            self.prerecord_blank(stmt);
        }

        let mut report = BatchReport::default();
        for stmt in statements {
            match self.apply(stmt.clone()).await {
                Ok(()) => report.applied += 1,
                Err(err) if err.is_statement_local() => {
                    warn!(?stmt, %err, "statement rejected");
                    report.rejected.push((stmt.clone(), err));
                }
                Err(err) => {
                    self.buffer.rollback().await?;
                    return Err(err);
                }
            }
        }
        self.buffer.commit().await?;
        Ok(report)
    }

    fn prerecord_blank(&mut self, stmt: &Statement) {
        if let Statement::InsertValue {
            subject,
            property,
            object,
        } = stmt
        {
            if crate::store::blank::BlankNodeBuffer::is_blank(subject) {
                let object_text = match object {
                    Object::Uri(u) => u.as_str(),
                    Object::Literal(l) => l.as_str(),
                };
                self.buffer.record_blank_pair(subject, property, object_text);
            }
        }
    }

    async fn apply(&mut self, stmt: Statement) -> Result<()> {
        match stmt {
            Statement::InsertType { subject, class } => {
                let class_id = self.class_id(&class)?;
                let subject_id = self.buffer.resolve_subject(&subject).await?;
                self.buffer.add_type(subject_id, class_id).await
            }
            Statement::InsertValue {
                subject,
                property,
                object,
            } => {
                let (prop_id, class_id) = self.resolve_property(&property)?;
                let subject_id = self.buffer.resolve_subject(&subject).await?;
                self.check_domain(subject_id, class_id, &subject, &property).await?;
                let value = self.coerce(&property, prop_id, object).await?;

                if self.registry.property(prop_id).single_valued {
                    let key = (subject_id, prop_id);
                    if let Some(prior) = self.seen_single_valued.get(&key) {
                        if *prior != value {
                            return Err(TrackerError::ConstraintCardinality(property.clone()));
                        }
                    } else {
                        self.seen_single_valued.insert(key, value.clone());
                    }
                }

                self.buffer
                    .set_value(subject_id, class_id, prop_id, &value)
                    .await?;

                if let Some(dispatcher) = &self.writeback {
                    dispatcher.observe(&subject, &property, &value).await?;
                }
                Ok(())
            }
            Statement::DeleteValue {
                subject,
                property,
                object,
            } => {
                let (prop_id, class_id) = self.resolve_property(&property)?;
                let subject_id = self.buffer.resolve_subject(&subject).await?;
                self.check_domain(subject_id, class_id, &subject, &property).await?;
                let value = match object {
                    Some(o) => Some(self.coerce(&property, prop_id, o).await?),
                    None => None,
                };
                self.buffer
                    .delete_value(subject_id, class_id, prop_id, value.as_ref())
                    .await
            }
            Statement::DeleteSubject { subject } => {
                let subject_id = self.buffer.resolve_subject(&subject).await?;
                self.buffer.delete_subject(subject_id).await
            }
            Statement::UpdateUri { old, new } => {
                self.buffer.update_uri(&old, &new).await.map(|_| ())
            }
        }
    }

    /// A property's value can only be set on a subject that's been typed as
    /// (or as a subclass of) the property's declared domain; `class_id`'s
    /// closure already encodes that subsumption, so checking membership in
    /// any asserted type's closure is enough.
    async fn check_domain(
        &mut self,
        subject_id: i64,
        class_id: ClassId,
        subject: &str,
        property: &str,
    ) -> Result<()> {
        let types = self.buffer.subject_classes(subject_id).await?;
        let satisfied = types
            .iter()
            .any(|&t| self.registry.class(t).closure.contains(&class_id));
        if satisfied {
            Ok(())
        } else {
            Err(TrackerError::ConstraintDomain {
                subject: subject.to_string(),
                property: property.to_string(),
            })
        }
    }

    fn class_id(&self, class: &str) -> Result<ClassId> {
        self.registry
            .class_id(class)
            .ok_or_else(|| TrackerError::UnknownClass(class.to_string()))
    }

    /// Resolves a property's id and the table it's stored on (its declared
    /// domain; the table lookup fails with [`ConstraintDomain`] if the
    /// property has no domain, since there would be nowhere to store it).
    fn resolve_property(&self, property: &str) -> Result<(PropertyId, ClassId)> {
        let prop_id = self
            .registry
            .property_id(property)
            .ok_or_else(|| TrackerError::UnknownProperty(property.to_string()))?;
        let class_id = self.registry.property(prop_id).domain.ok_or_else(|| {
            TrackerError::ConstraintDomain {
                subject: String::new(),
                property: property.to_string(),
            }
        })?;
        Ok((prop_id, class_id))
    }

    /// Converts the wire-level [`Object`] into a stored [`Value`],
    /// resolving URI objects to resource ids when the property's range is a
    /// class, or parsing the literal per the property's data type otherwise.
    async fn coerce(&mut self, property: &str, prop_id: PropertyId, object: Object) -> Result<Value> {
        let prop = self.registry.property(prop_id);
        match (&prop.range, object) {
            (Some(range), Object::Uri(uri)) if range.is_resource() => {
                let id = self.buffer.resolve_subject(&uri).await?;
                Ok(Value::Resource(id))
            }
            (Some(range), Object::Literal(text)) => {
                Value::coerce_literal(&text, range.data_type()).map_err(|_| TrackerError::TypeMismatch {
                    property: property.to_string(),
                    expected: "declared range",
                    actual: "literal",
                })
            }
            (None, _) => Err(TrackerError::UnknownProperty(property.to_string())),
            (Some(_), Object::Uri(_)) => Err(TrackerError::TypeMismatch {
                property: property.to_string(),
                expected: "literal",
                actual: "uri",
            }),
        }
    }
}
