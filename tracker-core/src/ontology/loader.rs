//! Parses the ontology's bootstrap files: one `<subject> <predicate>
//! <object> .` statement per record, loaded in lexicographic filename
//! order. Recognises a small, fixed vocabulary of predicates.

use super::registry::{OntologyError, Registry};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// A non-fatal issue surfaced during ontology load: duplicate declarations,
/// dangling `sub-class-of`/`sub-property-of` references. Load continues
/// past these; only a cycle or I/O failure aborts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyDiagnostic {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub diagnostics: Vec<OntologyDiagnostic>,
}

/// Parses one file's worth of `<s> <p> <o> .` statements. Blank lines and
/// lines starting with `#` are skipped.
pub fn parse_statements(text: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_suffix('.').unwrap_or(line).trim();
        let mut parts = line.splitn(3, char::is_whitespace);
        let (Some(subject), Some(predicate), Some(object)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        statements.push(Statement {
            subject: unwrap_iri(subject).to_string(),
            predicate: unwrap_iri(predicate).to_string(),
            object: unwrap_iri(object.trim()).to_string(),
        });
    }
    statements
}

fn unwrap_iri(token: &str) -> &str {
    token
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_matches('"')
}

/// Loads every `*.ontology` (or any regular) file in `dir`, in sorted
/// filename order, and populates `registry`. Duplicate/unknown-reference
/// issues are collected in the returned report rather than aborting.
pub fn load_dir(registry: &mut Registry, dir: &Path) -> Result<LoadReport, OntologyError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| OntologyError::UnknownReference(format!("reading {dir:?}: {e}")))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut report = LoadReport::default();
    for file in files {
        let text = fs::read_to_string(&file)
            .map_err(|e| OntologyError::UnknownReference(format!("reading {file:?}: {e}")))?;
        load_statements(registry, &file, &parse_statements(&text), &mut report);
    }
    registry.finalize()?;
    Ok(report)
}

/// Applies a pre-parsed statement list (used directly by tests and by the
/// `#[cfg(test)]` fixtures elsewhere in the crate).
pub fn load_statements(
    registry: &mut Registry,
    file: &Path,
    statements: &[Statement],
    report: &mut LoadReport,
) {
    // Pass 1: declare every class/property/namespace named by `type`.
    for (line, stmt) in statements.iter().enumerate() {
        if stmt.predicate != super::registry::RDF_TYPE {
            continue;
        }
        let result = match stmt.object.as_str() {
            "Class" => registry.declare_class(&stmt.subject).map(|_| ()),
            "Property" => registry.declare_property(&stmt.subject).map(|_| ()),
            "Namespace" => {
                registry.declare_namespace(&stmt.subject);
                Ok(())
            }
            _ => continue,
        };
        if let Err(err) = result {
            diagnose(report, file, line, err.to_string());
        }
    }

    // Pass 2: attach sub-class/sub-property/domain/range/flags.
    for (line, stmt) in statements.iter().enumerate() {
        match stmt.predicate.as_str() {
            "rdf:type" => continue,
            "rdfs:subClassOf" | "sub-class-of" => {
                apply_super_class(registry, stmt, file, line, report)
            }
            "rdfs:subPropertyOf" | "sub-property-of" => {
                apply_super_property(registry, stmt, file, line, report)
            }
            "rdfs:domain" | "domain" => apply_domain(registry, stmt, file, line, report),
            "rdfs:range" | "range" => apply_range(registry, stmt, file, line, report),
            "nrl:maxCardinality" | "max-cardinality" => {
                if let Some(pid) = registry.property_id(&stmt.subject) {
                    registry.property_mut(pid).single_valued = stmt.object == "1";
                } else {
                    diagnose(
                        report,
                        file,
                        line,
                        format!("max-cardinality on unknown property {}", stmt.subject),
                    );
                }
            }
            "tracker:indexed" | "indexed" => set_bool_flag(registry, stmt, file, line, report, |p, v| {
                p.indexed = v
            }),
            "tracker:fulltextIndexed" | "fulltext-indexed" => {
                set_bool_flag(registry, stmt, file, line, report, |p, v| {
                    p.fulltext_indexed = v
                })
            }
            "tracker:transient" | "transient" => {
                set_bool_flag(registry, stmt, file, line, report, |p, v| p.transient = v)
            }
            "nrl:weight" | "weight" => {
                if let Some(pid) = registry.property_id(&stmt.subject) {
                    if let Ok(w) = stmt.object.parse::<i32>() {
                        registry.property_mut(pid).weight = w;
                    }
                }
            }
            "prefix" => {
                if let Some(ns) = registry.namespaces.get_mut(&stmt.subject) {
                    ns.prefix = Some(stmt.object.clone());
                } else {
                    diagnose(
                        report,
                        file,
                        line,
                        format!("prefix on unknown namespace {}", stmt.subject),
                    );
                }
            }
            other => diagnose(report, file, line, format!("unrecognised predicate {other}")),
        }
    }
}

fn apply_super_class(
    registry: &mut Registry,
    stmt: &Statement,
    file: &Path,
    line: usize,
    report: &mut LoadReport,
) {
    let (Some(child), Some(parent)) = (
        registry.class_id(&stmt.subject),
        registry.class_id(&stmt.object),
    ) else {
        diagnose(
            report,
            file,
            line,
            format!("sub-class-of references unknown class {} or {}", stmt.subject, stmt.object),
        );
        return;
    };
    registry.class_mut(child).super_classes.push(parent);
}

fn apply_super_property(
    registry: &mut Registry,
    stmt: &Statement,
    file: &Path,
    line: usize,
    report: &mut LoadReport,
) {
    let (Some(child), Some(parent)) = (
        registry.property_id(&stmt.subject),
        registry.property_id(&stmt.object),
    ) else {
        diagnose(
            report,
            file,
            line,
            format!(
                "sub-property-of references unknown property {} or {}",
                stmt.subject, stmt.object
            ),
        );
        return;
    };
    registry.property_mut(child).super_properties.push(parent);
}

fn apply_domain(registry: &mut Registry, stmt: &Statement, file: &Path, line: usize, report: &mut LoadReport) {
    let Some(pid) = registry.property_id(&stmt.subject) else {
        diagnose(report, file, line, format!("domain on unknown property {}", stmt.subject));
        return;
    };
    let Some(cid) = registry.class_id(&stmt.object) else {
        diagnose(report, file, line, format!("domain references unknown class {}", stmt.object));
        return;
    };
    registry.property_mut(pid).domain = Some(cid);
}

fn apply_range(registry: &mut Registry, stmt: &Statement, file: &Path, line: usize, report: &mut LoadReport) {
    let Some(pid) = registry.property_id(&stmt.subject) else {
        diagnose(report, file, line, format!("range on unknown property {}", stmt.subject));
        return;
    };
    let range = match stmt.object.as_str() {
        "xsd:string" => super::registry::Range::Data(super::registry::DataType::String),
        "xsd:integer" => super::registry::Range::Data(super::registry::DataType::Int64),
        "xsd:boolean" => super::registry::Range::Data(super::registry::DataType::Bool),
        "xsd:double" => super::registry::Range::Data(super::registry::DataType::Double),
        "xsd:date" => super::registry::Range::Data(super::registry::DataType::Date),
        "xsd:dateTime" => super::registry::Range::Data(super::registry::DataType::DateTime),
        class_uri => match registry.class_id(class_uri) {
            Some(cid) => super::registry::Range::Class(cid),
            None => {
                diagnose(report, file, line, format!("range references unknown class {class_uri}"));
                return;
            }
        },
    };
    registry.property_mut(pid).range = Some(range);
}

fn set_bool_flag(
    registry: &mut Registry,
    stmt: &Statement,
    file: &Path,
    line: usize,
    report: &mut LoadReport,
    apply: impl Fn(&mut super::registry::Property, bool),
) {
    let Some(pid) = registry.property_id(&stmt.subject) else {
        diagnose(report, file, line, format!("boolean flag on unknown property {}", stmt.subject));
        return;
    };
    apply(registry.property_mut(pid), stmt.object == "true");
}

fn diagnose(report: &mut LoadReport, file: &Path, line: usize, message: String) {
    warn!(file = %file.display(), line, %message, "ontology load diagnostic");
    report.diagnostics.push(OntologyDiagnostic {
        file: file.to_path_buf(),
        line,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::registry::ROOT_CLASS_URI;

    fn load(text: &str) -> (Registry, LoadReport) {
        let mut registry = Registry::new();
        let mut report = LoadReport::default();
        let statements = parse_statements(text);
        load_statements(&mut registry, Path::new("test.onto"), &statements, &mut report);
        registry.finalize().unwrap();
        (registry, report)
    }

    #[test]
    fn loads_class_and_single_valued_property() {
        let text = format!(
            "{root} rdf:type Class .\nPerson rdf:type Class .\nPerson rdfs:subClassOf {root} .\n\
             name rdf:type Property .\nname rdfs:domain Person .\nname rdfs:range xsd:string .\n\
             name max-cardinality 1 .\n",
            root = ROOT_CLASS_URI
        );
        let (registry, report) = load(&text);

        assert!(report.diagnostics.is_empty());
        let person = registry.class_id("Person").unwrap();
        let name = registry.property_id("name").unwrap();
        assert_eq!(registry.property(name).domain, Some(person));
        assert!(registry.property(name).single_valued);
    }

    #[test]
    fn duplicate_declaration_is_a_diagnostic_not_a_failure() {
        let text = "Person rdf:type Class .\nPerson rdf:type Class .\n";
        let (_, report) = load(text);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn dangling_sub_class_of_is_a_diagnostic() {
        let text = "Person rdf:type Class .\nPerson rdfs:subClassOf Ghost .\n";
        let (_, report) = load(text);
        assert_eq!(report.diagnostics.len(), 1);
    }
}
