use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use infra_portal::authz::{PermissionDocument, Role, TeamPolicy};
use infra_portal::forms::render_form;
use infra_portal::schema::ResourceSchema;

#[derive(Parser, Debug)]
#[command(author, version, about = "infra-portal admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a permission document and summarize each team's capabilities
    ValidatePermissions { file: PathBuf },
    /// Render the form descriptor for a schema file as a given role would see it
    RenderForm {
        /// Path to a resource schema JSON file
        schema: PathBuf,
        /// Resource kind identifier used for limitation lookups
        #[arg(long)]
        kind: String,
        /// Role to render as (admin, contributor, viewer)
        #[arg(long, default_value = "admin")]
        role: String,
        /// Permission document to resolve the policy from
        #[arg(long)]
        permissions: Option<PathBuf>,
        /// Team key inside the permission document
        #[arg(long)]
        team: Option<String>,
    },
    /// Write the OpenAPI document to a file
    DumpOpenapi {
        #[arg(long, default_value = "/tmp/infra-portal-openapi.json")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ValidatePermissions { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let document: PermissionDocument =
                serde_yaml::from_str(&raw).context("failed to parse permission document")?;

            if document.teams.is_empty() {
                anyhow::bail!("permission document defines no teams");
            }

            for (team, policy) in &document.teams {
                let limited_fields: usize = policy.limitations.values().map(|fields| fields.len()).sum();
                println!(
                    "team {team}: role={} environments=[{}] resources=[{}] approvals={} limited-fields={}",
                    if policy.role.is_empty() { "-" } else { &policy.role },
                    policy.environments.join(", "),
                    policy.resources.join(", "),
                    policy.approval_required.values().filter(|v| **v).count(),
                    limited_fields,
                );
            }
        }
        Commands::RenderForm {
            schema,
            kind,
            role,
            permissions,
            team,
        } => {
            let raw = fs::read_to_string(&schema)
                .with_context(|| format!("failed to read {}", schema.display()))?;
            let parsed: ResourceSchema =
                serde_json::from_str(&raw).context("failed to parse resource schema")?;

            let role: Role = role.parse().map_err(|err: String| anyhow::anyhow!(err))?;

            let policy = match permissions {
                Some(path) => {
                    let team = team.context("--team is required when --permissions is given")?;
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let document: PermissionDocument =
                        serde_yaml::from_str(&raw).context("failed to parse permission document")?;
                    document
                        .team(&team)
                        .cloned()
                        .with_context(|| format!("team '{team}' not found in permission document"))?
                }
                None => TeamPolicy::default(),
            };

            let descriptor = render_form(&kind, &parsed, role, &policy);
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Commands::DumpOpenapi { out } => {
            let doc = infra_portal::docs::build_openapi(8000)?;
            fs::write(&out, serde_json::to_string_pretty(&doc)?)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {}", out.display());
        }
    }

    Ok(())
}
