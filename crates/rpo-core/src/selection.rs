//! Record selection: path globs, actor aliases and actor exclusion.

use crate::aggregate::{Extreme, RankSpec};
use crate::error::{Error, Result};
use crate::record::{actor_column, AttributionRow, FileChangeRow, Identity, IdentityField, Role};
use crate::table::Table;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Files commonly generated by package managers.
pub const GENERATED_FILE_GLOBS: &[&str] = &[
    "*.lock",
    "**/package-lock.json",
    "**/go.sum",
    "**/node_modules/**",
];

/// User-facing options controlling which records are analysed and how
/// results are grouped and ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    /// Group by the author or the committer of each commit.
    pub aggregate_by: Role,
    /// Identify actors by name or by email.
    pub identify_by: IdentityField,
    /// Column to sort results on. Defaults to the actor column.
    pub sort_by: Option<String>,
    pub descending: bool,
    /// Maximum number of rows to keep after sorting; zero keeps all.
    pub limit: usize,
    /// Keep the largest (top-k) or smallest (bottom-k) rows when limited.
    pub extreme: Extreme,
    /// Alias → canonical value, applied to the identifying field.
    pub aliases: HashMap<String, String>,
    /// Names or emails whose records are dropped before aggregation.
    pub exclude_users: Vec<String>,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    /// Drop lock files and vendored package-manager output.
    pub ignore_generated: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            aggregate_by: Role::Author,
            identify_by: IdentityField::Name,
            sort_by: None,
            descending: false,
            limit: 0,
            extreme: Extreme::Largest,
            aliases: HashMap::new(),
            exclude_users: Vec::new(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            ignore_generated: true,
        }
    }
}

impl SelectionOptions {
    /// Parse options from JSON. Unknown enum values are configuration errors.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration(format!("invalid options: {e}")))
    }

    /// Column holding the actor identity, e.g. `author_name`.
    pub fn actor_key(&self) -> String {
        actor_column(self.aggregate_by, self.identify_by)
    }

    pub fn rank_spec(&self) -> RankSpec {
        RankSpec {
            sort_key: self.sort_by.clone().unwrap_or_else(|| self.actor_key()),
            descending: self.descending,
            limit: self.limit,
            extreme: self.extreme,
        }
    }

    /// Merge an alias file into the alias map.
    ///
    /// The file is a JSON object mapping each canonical identity to one alias
    /// or a list of aliases: `{"Ada Lovelace": ["ada", "A. Lovelace"]}`.
    pub fn load_alias_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Aliases {
            One(String),
            Many(Vec<String>),
        }

        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let parsed: HashMap<String, Aliases> = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!("invalid alias file {}: {e}", path.display()))
        })?;

        let mut added = 0;
        for (canonical, aliases) in parsed {
            let aliases = match aliases {
                Aliases::One(alias) => vec![alias],
                Aliases::Many(aliases) => aliases,
            };
            for alias in aliases {
                self.aliases.insert(alias, canonical.clone());
                added += 1;
            }
        }
        tracing::debug!("Loaded {} alias(es) from {}", added, path.display());
        Ok(added)
    }
}

/// Path rule, evaluated as the first applicable of the chain.
#[derive(Debug, Clone)]
enum PathRule {
    Exclude(GlobSet),
    Include(GlobSet),
    Generated(GlobSet),
    All,
}

/// Keep/drop decisions and identity rewriting for records.
#[derive(Debug, Clone)]
pub struct SelectionFilter {
    path_rule: PathRule,
    role: Role,
    field: IdentityField,
    aliases: HashMap<String, String>,
    /// Excluded names, compared as given.
    excluded_names: HashSet<String>,
    /// Excluded emails, compared lower-cased.
    excluded_emails: HashSet<String>,
}

impl SelectionFilter {
    /// Build a filter, compiling globs up front.
    pub fn new(options: &SelectionOptions) -> Result<Self> {
        let path_rule = if !options.exclude_globs.is_empty() {
            PathRule::Exclude(build_globs(&options.exclude_globs)?)
        } else if !options.include_globs.is_empty() {
            PathRule::Include(build_globs(&options.include_globs)?)
        } else if options.ignore_generated {
            PathRule::Generated(build_globs(GENERATED_FILE_GLOBS)?)
        } else {
            PathRule::All
        };

        let normalize = |s: &str| match options.identify_by {
            IdentityField::Email => s.trim().to_lowercase(),
            IdentityField::Name => s.trim().to_string(),
        };
        let aliases = options
            .aliases
            .iter()
            .map(|(alias, canonical)| (normalize(alias), normalize(canonical)))
            .collect();
        let excluded_names = options
            .exclude_users
            .iter()
            .map(|u| u.trim().to_string())
            .collect();
        let excluded_emails = options
            .exclude_users
            .iter()
            .map(|u| u.trim().to_lowercase())
            .collect();

        Ok(Self {
            path_rule,
            role: options.aggregate_by,
            field: options.identify_by,
            aliases,
            excluded_names,
            excluded_emails,
        })
    }

    /// A filter that keeps everything and rewrites nothing.
    pub fn keep_all(role: Role, field: IdentityField) -> Self {
        Self {
            path_rule: PathRule::All,
            role,
            field,
            aliases: HashMap::new(),
            excluded_names: HashSet::new(),
            excluded_emails: HashSet::new(),
        }
    }

    /// Column holding the canonical actor identity.
    pub fn actor_key(&self) -> String {
        actor_column(self.role, self.field)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether a path survives the glob rules.
    pub fn keep_path(&self, path: &str) -> bool {
        match &self.path_rule {
            PathRule::Exclude(globs) | PathRule::Generated(globs) => !globs.is_match(path),
            PathRule::Include(globs) => globs.is_match(path),
            PathRule::All => true,
        }
    }

    /// Canonical value for an identifying field value.
    pub fn canonical<'a>(&'a self, value: &'a str) -> &'a str {
        self.aliases.get(value).map(String::as_str).unwrap_or(value)
    }

    /// Rewrite the identifying field of an identity through the aliases.
    pub fn canonical_identity(&self, identity: &Identity) -> Identity {
        let canonical = self.canonical(identity.field(self.field)).to_string();
        identity.clone().with_field(self.field, canonical)
    }

    /// Whether an actor is excluded, by raw name, raw email or canonical value.
    pub fn is_excluded(&self, identity: &Identity) -> bool {
        if self.excluded_names.is_empty() {
            return false;
        }
        let canonical = self.canonical(identity.field(self.field));
        let canonical_excluded = match self.field {
            IdentityField::Name => self.excluded_names.contains(canonical),
            IdentityField::Email => self.excluded_emails.contains(canonical),
        };
        self.excluded_names.contains(&identity.name)
            || self.excluded_emails.contains(&identity.email)
            || canonical_excluded
    }

    /// Keep/drop decision for a file change.
    pub fn keep_file_change(&self, row: &FileChangeRow) -> bool {
        self.keep_path(&row.change.path) && !self.is_excluded(row.commit.identity(self.role))
    }

    /// Keep/drop decision for a hunk. Hunks of unknown commits have no actor
    /// and are never excluded by actor.
    pub fn keep_attribution(&self, row: &AttributionRow) -> bool {
        self.keep_path(&row.hunk.path)
            && row
                .commit
                .as_ref()
                .map_or(true, |c| !self.is_excluded(c.identity(self.role)))
    }

    /// Filter file changes into a table with canonical identities.
    pub fn file_change_table(&self, rows: &[FileChangeRow]) -> Result<Table> {
        let mut table = Table::new(FileChangeRow::schema());
        for row in rows.iter().filter(|r| self.keep_file_change(r)) {
            let author = self.canonical_identity(&row.commit.author);
            let committer = self.canonical_identity(&row.commit.committer);
            table.push_row(row.values(&author, &committer))?;
        }
        Ok(table)
    }

    /// Filter hunks into a table with canonical identities.
    pub fn attribution_table(&self, rows: &[AttributionRow]) -> Result<Table> {
        let mut table = Table::new(AttributionRow::schema());
        for row in rows.iter().filter(|r| self.keep_attribution(r)) {
            let actors = row.commit.as_ref().map(|c| {
                (
                    self.canonical_identity(&c.author),
                    self.canonical_identity(&c.committer),
                )
            });
            table.push_row(row.values(actors.as_ref().map(|(a, c)| (a, c))))?;
        }
        Ok(table)
    }
}

fn build_globs<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern.as_ref()).map_err(|e| {
            Error::Configuration(format!("invalid glob {:?}: {e}", pattern.as_ref()))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build glob set: {e}")))
}
