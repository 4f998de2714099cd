//! Declarative description of the webhook deployment.
//!
//! The manifest names every cloud resource the service needs (GraphQL API,
//! API key, IAM roles, the Lambda function, its data source and resolver)
//! and how they reference each other. Nothing here talks to a cloud
//! provider; a provisioning tool consumes the validated, rendered form.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// AppSync refuses API keys that live longer than a year.
pub const MAX_API_KEY_DAYS: u32 = 365;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to load manifest: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Manifest has {} problem(s)", .0.len())]
    Invalid(Vec<ManifestIssue>),

    #[error("Failed to render manifest: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestIssue {
    pub location: String,
    pub problem: String,
}

impl ManifestIssue {
    fn new(location: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.problem)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackManifest {
    pub app_name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    pub api: ApiSpec,
    #[serde(default)]
    pub api_key: ApiKeySpec,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
    #[serde(default)]
    pub data_sources: Vec<DataSourceSpec>,
    #[serde(default)]
    pub resolvers: Vec<ResolverSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub id: String,
    pub assumed_by: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub statements: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationType {
    ApiKey,
    AwsIam,
    AmazonCognitoUserPools,
    OpenidConnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLogLevel {
    None,
    Error,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSpec {
    pub name: String,
    pub authentication_type: AuthenticationType,
    #[serde(default)]
    pub xray_enabled: bool,
    pub schema_path: String,
    pub log_config: Option<LogConfigSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfigSpec {
    pub field_log_level: FieldLogLevel,
    pub role: String,
    #[serde(default)]
    pub exclude_verbose_content: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeySpec {
    pub expires_in_days: u32,
}

impl Default for ApiKeySpec {
    fn default() -> Self {
        Self {
            expires_in_days: MAX_API_KEY_DAYS,
        }
    }
}

impl ApiKeySpec {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.expires_in_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub id: String,
    pub runtime: String,
    pub handler: String,
    pub code_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    AwsLambda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceSpec {
    pub name: String,
    pub kind: DataSourceKind,
    pub function: String,
    pub service_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSpec {
    pub type_name: String,
    pub field_name: String,
    pub data_source: String,
    pub request_mapping_template: String,
    pub response_mapping_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSource {
    ApiGraphqlUrl,
    ApiKeyValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub value: OutputSource,
    #[serde(default)]
    pub description: String,
}

/// Manifest plus values computed at render time.
#[derive(Debug, Serialize)]
pub struct RenderedStack<'a> {
    pub rendered_at: DateTime<Utc>,
    pub api_key_expires_at: DateTime<Utc>,
    pub api_key_expires_epoch: i64,
    pub manifest: &'a StackManifest,
}

impl StackManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let settings = Config::builder().add_source(File::from(path)).build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ManifestError> {
        let settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Every dangling reference, duplicate and empty policy in the manifest.
    pub fn validate(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        if self.app_name.trim().is_empty() {
            issues.push(ManifestIssue::new("app_name", "must not be empty"));
        }

        let role_ids = collect_unique(
            self.roles.iter().map(|r| r.id.as_str()),
            "roles",
            &mut issues,
        );
        let function_ids = collect_unique(
            self.functions.iter().map(|f| f.id.as_str()),
            "functions",
            &mut issues,
        );
        let data_source_names = collect_unique(
            self.data_sources.iter().map(|d| d.name.as_str()),
            "data_sources",
            &mut issues,
        );
        collect_unique(
            self.outputs.iter().map(|o| o.name.as_str()),
            "outputs",
            &mut issues,
        );

        for role in &self.roles {
            let location = format!("roles.{}", role.id);
            if role.statements.is_empty() {
                issues.push(ManifestIssue::new(&location, "has no policy statements"));
            }
            for (index, statement) in role.statements.iter().enumerate() {
                if statement.actions.is_empty() {
                    issues.push(ManifestIssue::new(
                        format!("{}.statements[{}]", location, index),
                        "has no actions",
                    ));
                }
                if statement.resources.is_empty() {
                    issues.push(ManifestIssue::new(
                        format!("{}.statements[{}]", location, index),
                        "has no resources",
                    ));
                }
            }
        }

        if let Some(log_config) = &self.api.log_config {
            if !role_ids.contains(log_config.role.as_str()) {
                issues.push(ManifestIssue::new(
                    "api.log_config.role",
                    format!("unknown role '{}'", log_config.role),
                ));
            }
        }

        if self.api.authentication_type == AuthenticationType::ApiKey {
            if self.api_key.expires_in_days == 0 || self.api_key.expires_in_days > MAX_API_KEY_DAYS {
                issues.push(ManifestIssue::new(
                    "api_key.expires_in_days",
                    format!("must be between 1 and {}", MAX_API_KEY_DAYS),
                ));
            }
        } else if self
            .outputs
            .iter()
            .any(|o| o.value == OutputSource::ApiKeyValue)
        {
            issues.push(ManifestIssue::new(
                "outputs",
                "api_key_value is only available with api_key authentication",
            ));
        }

        for function in &self.functions {
            if function.handler.trim().is_empty() {
                issues.push(ManifestIssue::new(
                    format!("functions.{}.handler", function.id),
                    "must not be empty",
                ));
            }
        }

        for data_source in &self.data_sources {
            let location = format!("data_sources.{}", data_source.name);
            if !function_ids.contains(data_source.function.as_str()) {
                issues.push(ManifestIssue::new(
                    format!("{}.function", location),
                    format!("unknown function '{}'", data_source.function),
                ));
            }
            if !role_ids.contains(data_source.service_role.as_str()) {
                issues.push(ManifestIssue::new(
                    format!("{}.service_role", location),
                    format!("unknown role '{}'", data_source.service_role),
                ));
            }
        }

        let mut resolver_fields = HashSet::new();
        for resolver in &self.resolvers {
            let location = format!("resolvers.{}.{}", resolver.type_name, resolver.field_name);
            if !resolver_fields.insert((resolver.type_name.as_str(), resolver.field_name.as_str())) {
                issues.push(ManifestIssue::new(&location, "declared more than once"));
            }
            if !data_source_names.contains(resolver.data_source.as_str()) {
                issues.push(ManifestIssue::new(
                    format!("{}.data_source", location),
                    format!("unknown data source '{}'", resolver.data_source),
                ));
            }
            if resolver.request_mapping_template.trim().is_empty() {
                issues.push(ManifestIssue::new(
                    format!("{}.request_mapping_template", location),
                    "must not be empty",
                ));
            }
        }

        issues
    }

    /// Checks that the GraphQL schema exists next to the manifest and
    /// declares every resolved field.
    pub fn check_schema(&self, base_dir: &Path) -> Vec<ManifestIssue> {
        let schema_file = base_dir.join(&self.api.schema_path);
        let schema = match std::fs::read_to_string(&schema_file) {
            Ok(schema) => schema,
            Err(e) => {
                return vec![ManifestIssue::new(
                    "api.schema_path",
                    format!("cannot read {}: {}", schema_file.display(), e),
                )]
            }
        };

        self.resolvers
            .iter()
            .filter(|resolver| !schema_declares(&schema, &resolver.type_name, &resolver.field_name))
            .map(|resolver| {
                ManifestIssue::new(
                    format!("resolvers.{}.{}", resolver.type_name, resolver.field_name),
                    "field is not declared in the schema",
                )
            })
            .collect()
    }

    pub fn render(&self, now: DateTime<Utc>) -> Result<String, ManifestError> {
        let expires_at = self.api_key.expires_at(now);
        let rendered = RenderedStack {
            rendered_at: now,
            api_key_expires_at: expires_at,
            api_key_expires_epoch: expires_at.timestamp(),
            manifest: self,
        };
        Ok(serde_json::to_string_pretty(&rendered)?)
    }
}

fn collect_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    section: &str,
    issues: &mut Vec<ManifestIssue>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            issues.push(ManifestIssue::new(section, "entry with empty identifier"));
        } else if !seen.insert(id) {
            issues.push(ManifestIssue::new(section, format!("duplicate identifier '{}'", id)));
        }
    }
    seen
}

fn schema_declares(schema: &str, type_name: &str, field_name: &str) -> bool {
    let header = format!("type {}", type_name);

    // `type Mutation` and any `extend type Mutation` blocks, but not `type MutationResult`
    schema.match_indices(&header).any(|(start, _)| {
        let preceded = schema[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let rest = &schema[start + header.len()..];
        let followed = rest
            .chars()
            .next()
            .map_or(false, |c| c.is_whitespace() || c == '{');
        preceded && followed && block_declares(rest, field_name)
    })
}

fn block_declares(rest: &str, field_name: &str) -> bool {
    let Some(open) = rest.find('{') else {
        return false;
    };
    let body = match rest[open..].find('}') {
        Some(close) => &rest[open + 1..open + close],
        None => return false,
    };

    body.lines().any(|line| {
        let line = line.trim_start();
        line.strip_prefix(field_name)
            .map(|after| after.starts_with('(') || after.trim_start().starts_with(':'))
            .unwrap_or(false)
    })
}
