//! Output formatting

use erdsync_core::{Cardinality, ModelSchema, ModelSummary, Relationship, SyncReport};

use crate::args::OutputFormat;

/// Output formatter for command results
pub struct OutputFormatter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn print_relationships(&self, relationships: &[Relationship]) {
        match self.format {
            OutputFormat::Json => print_json(&serde_json::json!({ "relationships": relationships })),
            OutputFormat::Human => {
                for rel in relationships {
                    println!(
                        "{}.{} -> {}.{} ({})",
                        rel.source,
                        rel.source_field,
                        rel.target,
                        rel.target_field,
                        cardinality_name(rel)
                    );
                }
                if !self.quiet {
                    eprintln!("Found {} relationship(s)", relationships.len());
                }
            }
        }
    }

    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Json => {
                let errors: Vec<serde_json::Value> = report
                    .errors
                    .iter()
                    .map(|failure| {
                        serde_json::json!({
                            "entity_id": failure.entity_id,
                            "stage": failure.stage,
                            "code": failure.error.code(),
                            "kind": failure.error.kind(),
                            "message": failure.error.to_string(),
                        })
                    })
                    .collect();
                print_json(&serde_json::json!({
                    "written": report.written,
                    "unchanged": report.unchanged,
                    "errors": errors,
                }));
            }
            OutputFormat::Human => {
                for path in &report.written {
                    println!("wrote {}", path.display());
                }
                for failure in &report.errors {
                    eprintln!(
                        "\x1b[31merror\x1b[0m[{}]: {}: {} (during {})",
                        failure.error.code(),
                        failure.entity_id,
                        failure.error,
                        failure.stage
                    );
                }
                if !self.quiet {
                    eprintln!();
                    eprintln!(
                        "{} file(s) written, {} unchanged, {} error(s)",
                        report.written.len(),
                        report.unchanged.len(),
                        report.errors.len()
                    );
                }
            }
        }
    }

    pub fn print_models(&self, models: &[ModelSummary]) {
        match self.format {
            OutputFormat::Json => print_json(&serde_json::json!({ "models": models })),
            OutputFormat::Human => {
                for model in models {
                    let name = match model.version {
                        Some(v) => format!("{} (v{})", model.name, v),
                        None => model.name.clone(),
                    };
                    println!(
                        "{:<40} {:<13} {}",
                        name,
                        model.entity_type.as_str(),
                        model.schema_file.display()
                    );
                }
            }
        }
    }

    pub fn print_schema(&self, schema: &ModelSchema) {
        match self.format {
            OutputFormat::Json => print_json(&serde_json::json!(schema)),
            OutputFormat::Human => {
                println!("Model: {}", schema.name);
                if let Some(version) = schema.version {
                    println!("Version: {}", version);
                }
                if let Some(description) = &schema.description {
                    println!("Description: {}", description.trim());
                }
                if !schema.tags.is_empty() {
                    println!("Tags: {}", schema.tags.join(", "));
                }
                for column in schema.columns.values() {
                    println!(
                        "  - {} {}",
                        column.name,
                        column.data_type.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
}

fn cardinality_name(rel: &Relationship) -> &'static str {
    match rel.kind {
        Cardinality::OneToMany => "one_to_many",
        Cardinality::ManyToOne => "many_to_one",
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{:#}", value);
}
