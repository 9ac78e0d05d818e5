// 🧮 Statement Emitter - Registries + transactions → INSERT payloads
//
// Three independent passes (tickets, counters, transactions). Given the same
// registry, transactions and stamp time, every pass renders byte-identical
// output apart from the "Generated on" header line.

use chrono::NaiveDateTime;
use pg_escape::quote_literal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::builder::CanonicalTransaction;
use crate::config::{MigrationConfig, PriceRules};
use crate::registry::IdentityRegistry;
use crate::source::TIMESTAMP_FORMAT;

const GENERATED_ON_PREFIX: &str = "-- Generated on:";

// ============================================================================
// ARTIFACTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Tickets,
    Counters,
    Transactions,
}

impl ArtifactKind {
    /// Execution order against the target store (foreign keys point at the first two)
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Tickets,
        ArtifactKind::Counters,
        ArtifactKind::Transactions,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            ArtifactKind::Tickets => "tickets",
            ArtifactKind::Counters => "counters",
            ArtifactKind::Transactions => "transactions",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Tickets => "tickets_insert.sql",
            ArtifactKind::Counters => "counters_insert.sql",
            ArtifactKind::Transactions => "transactions_insert.sql",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Tickets => "tickets",
            ArtifactKind::Counters => "NEW counters",
            ArtifactKind::Transactions => "transactions",
        }
    }

    fn columns(&self) -> &'static str {
        match self {
            ArtifactKind::Tickets => {
                r#"id, price, dropdown_name, show_name, counter_id, is_analytics, deleted, "createdAt", "updatedAt""#
            }
            ArtifactKind::Counters => {
                r#"id, username, password, role, special, "createdAt", "updatedAt""#
            }
            ArtifactKind::Transactions => {
                r#"invoice_no, date, adult_count, child_count, category, total_paid, ticket_id, counter_id, "createdAt", "updatedAt""#
            }
        }
    }

    fn empty_notice(&self) -> &'static str {
        match self {
            ArtifactKind::Tickets => "-- No tickets to insert",
            ArtifactKind::Counters => {
                "-- No new counters to insert (all counters already exist in database)"
            }
            ArtifactKind::Transactions => "-- No transactions to insert",
        }
    }
}

/// One self-contained statement payload for one table
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub row_count: usize,
    pub generated_at: NaiveDateTime,
    pub body: String,
}

impl Artifact {
    /// Payload carries a header only, no INSERT
    pub fn is_noop(&self) -> bool {
        self.row_count == 0
    }

    /// SHA-256 of the payload with the generation timestamp line removed.
    /// Two runs over the same input and seed produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for line in self.body.lines() {
            if line.starts_with(GENERATED_ON_PREFIX) {
                continue;
            }
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// PRICING
// ============================================================================

/// First matching rule wins: combo+wax, combo, horror, default
pub fn ticket_price(show_name: &str, rules: &PriceRules) -> i64 {
    let name = show_name.to_lowercase();

    if name.contains("combo") && name.contains("wax") {
        rules.combo_wax
    } else if name.contains("combo") {
        rules.combo
    } else if name.contains("horror") {
        rules.horror
    } else {
        rules.default
    }
}

// ============================================================================
// DIALECTS
// ============================================================================

/// Target SQL flavour; decides how text literals are quoted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SqlDialect {
    /// `E'...'` escape strings when the text holds a backslash
    #[default]
    Postgres,

    /// Standard `'...'` with doubled quotes, backslashes kept verbatim
    Sqlite,
}

impl SqlDialect {
    pub fn quote_literal(&self, text: &str) -> String {
        match self {
            SqlDialect::Postgres => quote_literal(text),
            SqlDialect::Sqlite => format!("'{}'", text.replace('\'', "''")),
        }
    }
}

fn timestamp_literal(ts: &NaiveDateTime) -> String {
    format!("'{}'", ts.format(TIMESTAMP_FORMAT))
}

// ============================================================================
// EMITTER
// ============================================================================

pub struct StatementEmitter<'a> {
    config: &'a MigrationConfig,
    /// createdAt/updatedAt written on ticket and counter rows
    stamped_at: NaiveDateTime,
    dialect: SqlDialect,
}

impl<'a> StatementEmitter<'a> {
    pub fn new(config: &'a MigrationConfig, stamped_at: NaiveDateTime) -> Self {
        StatementEmitter {
            config,
            stamped_at,
            dialect: SqlDialect::default(),
        }
    }

    /// Builder pattern: render literals for another SQL flavour
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    fn literal(&self, text: &str) -> String {
        self.dialect.quote_literal(text)
    }

    fn assemble(&self, kind: ArtifactKind, values: Vec<String>, generated_at: NaiveDateTime) -> Artifact {
        let mut body = format!(
            "-- Auto-generated {} insert statements from spreadsheet data\n{} {}\n-- Total {}: {}\n\n",
            kind.table().to_uppercase(),
            GENERATED_ON_PREFIX,
            generated_at.format(TIMESTAMP_FORMAT),
            kind.label(),
            values.len(),
        );

        if values.is_empty() {
            body.push_str(kind.empty_notice());
            body.push('\n');
        } else {
            body.push_str(&format!(
                "INSERT INTO {} ({}) VALUES\n",
                kind.table(),
                kind.columns()
            ));
            body.push_str(&values.join(",\n"));
            body.push_str(";\n");
        }

        Artifact {
            kind,
            row_count: values.len(),
            generated_at,
            body,
        }
    }

    /// One row per ticket, in discovery order
    pub fn render_tickets(&self, registry: &IdentityRegistry, generated_at: NaiveDateTime) -> Artifact {
        let stamp = timestamp_literal(&self.stamped_at);
        let label = self.literal(&self.config.ticket_display_label);

        let values = registry
            .tickets()
            .iter()
            .map(|(show_name, id)| {
                format!(
                    "({}, {}, {}, {}, NULL, false, false, {}, {})",
                    id,
                    ticket_price(show_name, &self.config.prices),
                    label,
                    self.literal(show_name),
                    stamp,
                    stamp,
                )
            })
            .collect();

        self.assemble(ArtifactKind::Tickets, values, generated_at)
    }

    /// Only counters allocated by this run; pre-existing ones are never re-inserted
    pub fn render_counters(&self, registry: &IdentityRegistry, generated_at: NaiveDateTime) -> Artifact {
        let stamp = timestamp_literal(&self.stamped_at);
        let password = self.literal(&self.config.counter_password_hash);
        let role = self.literal(&self.config.counter_role);

        let values = registry
            .new_counters()
            .map(|(username, id)| {
                format!(
                    "({}, {}, {}, {}, false, {}, {})",
                    id,
                    self.literal(username),
                    password,
                    role,
                    stamp,
                    stamp,
                )
            })
            .collect();

        self.assemble(ArtifactKind::Counters, values, generated_at)
    }

    /// One row per transaction, in processing order
    pub fn render_transactions(
        &self,
        transactions: &[CanonicalTransaction],
        generated_at: NaiveDateTime,
    ) -> Artifact {
        let values = transactions
            .iter()
            .map(|tx| {
                format!(
                    "({}, {}, {}, {}, {}, {:.2}, {}, {}, {}, {})",
                    self.literal(&tx.invoice_no),
                    timestamp_literal(&tx.date),
                    tx.adult_count,
                    tx.child_count,
                    self.literal(&tx.category),
                    tx.total_paid,
                    tx.ticket_id,
                    tx.counter_id,
                    timestamp_literal(&tx.created_at),
                    timestamp_literal(&tx.updated_at),
                )
            })
            .collect();

        self.assemble(ArtifactKind::Transactions, values, generated_at)
    }

    /// All three payloads in execution order
    pub fn render_all(
        &self,
        registry: &IdentityRegistry,
        transactions: &[CanonicalTransaction],
        generated_at: NaiveDateTime,
    ) -> Vec<Artifact> {
        vec![
            self.render_tickets(registry, generated_at),
            self.render_counters(registry, generated_at),
            self.render_transactions(transactions, generated_at),
        ]
    }
}

// ============================================================================
// TESTS
// ============================================================================
