mod agent_stack;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use aws_config::environment::EnvironmentVariableRegionProvider;
use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::ProfileFileRegionProvider;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use agentstack_core::differ::create_plan;
use agentstack_core::effect::Effect;
use agentstack_core::plan::Plan;
use agentstack_core::provider::Provider;
use agentstack_core::resource::{REF_ATTRIBUTE, Value};
use agentstack_core::schema::ResourceSchema;
use agentstack_core::stack::Stack;
use agentstack_provider_aws::AwsProvider;
use agentstack_provider_aws::assets::DEFAULT_ASSET_REPOSITORY;
use agentstack_provider_aws::schemas;
use agentstack_state::{BackendConfig, StateBackend, StateFile, create_backend};

use agent_stack::{AgentStack, AgentStackConfig, DEFAULT_ASSET_DIR, DEFAULT_REGION, DEFAULT_STACK_NAME, build_agent_stack};

#[derive(Parser)]
#[command(name = "agentstack")]
#[command(about = "Deployment stack for the fantasy football chatbot agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Key/value file whose entries become the API container's environment
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[arg(long, global = true, default_value = DEFAULT_STACK_NAME)]
    stack_name: String,

    /// AWS region (default: AWS_REGION or the shared profile, then us-east-1)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Availability zones, comma separated (default: <region>a,<region>b)
    #[arg(long, global = true, value_delimiter = ',')]
    azs: Vec<String>,

    /// Number of tasks the service keeps running
    #[arg(long, global = true, default_value_t = 1)]
    desired_count: u32,

    /// Build context holding api.Dockerfile and app.Dockerfile
    #[arg(long, global = true, default_value = DEFAULT_ASSET_DIR)]
    asset_dir: PathBuf,

    /// ECR repository images are published to
    #[arg(long, global = true, default_value = DEFAULT_ASSET_REPOSITORY)]
    asset_repository: String,

    /// Local state file
    #[arg(long, global = true, default_value = "agentstack.state.json")]
    state: PathBuf,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn stack_config(&self, region: &str) -> AgentStackConfig {
        let mut config = AgentStackConfig::for_region(region);
        if !self.azs.is_empty() {
            config.availability_zones = self.azs.clone();
        }
        config.stack_name = self.stack_name.clone();
        config.desired_count = self.desired_count;
        config.env_file = self.env_file.clone();
        config.asset_dir = self.asset_dir.clone();
        config.asset_repository = self.asset_repository.clone();
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the stack and check every resource against its schema
    Validate,
    /// Render the CloudFormation template and asset manifest
    Synth {
        /// Directory to write <stack>.template.json and <stack>.assets.json to
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show what changed since the state was last recorded
    Diff,
    /// Record the declared stack as deployed
    Record {
        /// Deploy-time value, e.g. AgentALB.DNSName=my-alb-123.us-east-1.elb.amazonaws.com
        #[arg(long = "set", value_name = "LOGICAL.ATTR=VALUE")]
        set: Vec<String>,
    },
    /// Show the resource dependency tree
    Graph,
    /// Show stack outputs, resolved from the recorded state where possible
    Outputs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let region = match &cli.region {
        Some(region) => region.clone(),
        None => default_region().await,
    };
    let config = cli.stack_config(&region);

    let result = match &cli.command {
        Commands::Validate => run_validate(&config),
        Commands::Synth { out } => run_synth(&config, out.as_deref()),
        Commands::Diff => run_diff(&config, &cli.state).await,
        Commands::Record { set } => run_record(&config, &cli.state, set).await,
        Commands::Graph => run_graph(&config),
        Commands::Outputs => run_outputs(&config, &cli.state).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

/// Region from the AWS environment variables or shared profile
async fn default_region() -> String {
    let chain = RegionProviderChain::first_try(EnvironmentVariableRegionProvider::new())
        .or_else(ProfileFileRegionProvider::new())
        .or_else(DEFAULT_REGION);
    let region = chain
        .region()
        .await
        .map(|r| r.to_string())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    log::debug!("using region {}", region);
    region
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    let mut all_schemas = HashMap::new();
    for schema in schemas::all_schemas() {
        all_schemas.insert(schema.resource_type.clone(), schema);
    }
    all_schemas
}

fn build(config: &AgentStackConfig) -> Result<AgentStack, String> {
    build_agent_stack(config).map_err(|e| e.to_string())
}

fn validate_stack(stack: &Stack) -> Result<(), String> {
    stack.validate(&get_schemas()).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| format!("  {}", e)).collect();
        format!("{} errors found:\n{}", errors.len(), messages.join("\n"))
    })
}

fn run_validate(config: &AgentStackConfig) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let agent = build(config)?;
    validate_stack(&agent.stack)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", agent.stack.len())
            .green()
            .bold()
    );
    for resource in agent.stack.resources() {
        println!("  • {}.{}", resource.id.resource_type, resource.id.name);
    }

    Ok(())
}

fn run_synth(config: &AgentStackConfig, out: Option<&Path>) -> Result<(), String> {
    let agent = build(config)?;
    let template = AwsProvider::new()
        .synthesize(&agent.stack)
        .map_err(|e| format!("Synthesis failed: {}", e))?;
    let template_json = template
        .to_json_pretty()
        .map_err(|e| format!("Failed to serialize template: {}", e))?;

    let Some(dir) = out else {
        println!("{}", template_json);
        return Ok(());
    };

    let assets_json = agent
        .assets
        .to_json_pretty()
        .map_err(|e| format!("Failed to serialize asset manifest: {}", e))?;
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;

    let name = agent.stack.name();
    write_artifact(&dir.join(format!("{}.template.json", name)), &template_json)?;
    write_artifact(&dir.join(format!("{}.assets.json", name)), &assets_json)?;

    println!(
        "{}",
        format!(
            "✓ Synthesized {} ({} resources, {} images).",
            name,
            template.resources.len(),
            agent.assets.len()
        )
        .green()
        .bold()
    );
    Ok(())
}

/// Write `content` to `path`, showing a diff against what was there before
fn write_artifact(path: &Path, content: &str) -> Result<(), String> {
    match fs::read_to_string(path) {
        Ok(previous) if previous == content => {
            println!("  {} {}", "unchanged".dimmed(), path.display());
            return Ok(());
        }
        Ok(previous) => print_diff(path, &previous, content),
        Err(_) => println!("  {} {}", "created".green(), path.display()),
    }
    fs::write(path, content).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

async fn read_state(state_path: &Path) -> Result<Option<StateFile>, String> {
    let backend = create_backend(&BackendConfig::local(state_path.to_string_lossy()))
        .await
        .map_err(|e| format!("Failed to open state: {}", e))?;
    backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))
}

async fn run_diff(config: &AgentStackConfig, state_path: &Path) -> Result<(), String> {
    let agent = build(config)?;
    validate_stack(&agent.stack)?;

    let recorded = read_state(state_path)
        .await?
        .map(|state| state.states())
        .unwrap_or_default();
    let plan = create_plan(agent.stack.resources(), &recorded);
    print_plan(&plan);
    Ok(())
}

/// A `--set LOGICAL.ATTR=VALUE` deploy-time value
#[derive(Debug, PartialEq)]
struct Assignment {
    logical_id: String,
    attribute: String,
    value: String,
}

fn parse_assignment(s: &str) -> Result<Assignment, String> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected LOGICAL.ATTR=VALUE, got '{}'", s))?;
    let (logical_id, attribute) = target
        .split_once('.')
        .filter(|(id, attr)| !id.is_empty() && !attr.is_empty())
        .ok_or_else(|| format!("Expected LOGICAL.ATTR before '=', got '{}'", target))?;
    Ok(Assignment {
        logical_id: logical_id.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    })
}

async fn run_record(config: &AgentStackConfig, state_path: &Path, sets: &[String]) -> Result<(), String> {
    let agent = build(config)?;
    validate_stack(&agent.stack)?;
    let assignments = sets
        .iter()
        .map(|s| parse_assignment(s))
        .collect::<Result<Vec<_>, _>>()?;

    let backend = create_backend(&BackendConfig::local(state_path.to_string_lossy()))
        .await
        .map_err(|e| format!("Failed to open state: {}", e))?;
    backend
        .init()
        .await
        .map_err(|e| format!("Failed to initialize state: {}", e))?;
    let lock = backend
        .acquire_lock("record")
        .await
        .map_err(|e| format!("Failed to acquire state lock: {}", e))?;

    let result = record_state(backend.as_ref(), &agent.stack, &assignments).await;

    if let Err(e) = backend.release_lock(&lock).await {
        log::warn!("failed to release state lock {}: {}", lock.id, e);
    }
    let state = result?;

    println!(
        "{}",
        format!(
            "✓ Recorded {} resources (serial {}).",
            agent.stack.len(),
            state.serial
        )
        .green()
        .bold()
    );
    Ok(())
}

/// Record `stack` into the backend's state; the caller holds the lock
async fn record_state(
    backend: &dyn StateBackend,
    stack: &Stack,
    assignments: &[Assignment],
) -> Result<StateFile, String> {
    let mut state = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?
        .unwrap_or_default();

    let summary = state.record(stack.resources(), "aws");
    for name in &summary.removed {
        println!("  {} {}", "-".red().bold(), name.red());
    }

    for assignment in assignments {
        let resource = stack
            .get(&assignment.logical_id)
            .ok_or_else(|| format!("Unknown resource '{}'", assignment.logical_id))?;
        let recorded = state
            .find_resource_mut(&resource.id.resource_type, &assignment.logical_id)
            .ok_or_else(|| format!("Resource '{}' was not recorded", assignment.logical_id))?;
        if assignment.attribute == REF_ATTRIBUTE {
            recorded.identifier = Some(assignment.value.clone());
        } else {
            recorded.attributes.insert(
                format!("_{}", assignment.attribute),
                serde_json::Value::String(assignment.value.clone()),
            );
        }
    }

    state.increment_serial();
    backend
        .write_state(&state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))?;
    log::info!(
        "recorded {} resources, removed {}",
        summary.recorded,
        summary.removed.len()
    );
    Ok(state)
}

fn run_graph(config: &AgentStackConfig) -> Result<(), String> {
    let agent = build(config)?;
    let graph = agent.stack.dependency_graph();
    graph
        .topological_order()
        .map_err(|node| format!("Dependency cycle through '{}'", node))?;

    println!("{}", format!("Dependency graph for {}:", agent.stack.name()).cyan().bold());
    println!();

    fn print_node(
        stack: &Stack,
        graph: &agentstack_core::graph::DependencyGraph,
        node: &str,
        printed: &mut HashSet<String>,
        prefix: &str,
        connector: &str,
    ) {
        let seen = !printed.insert(node.to_string());
        let resource_type = stack
            .get(node)
            .map(|r| r.id.resource_type.as_str())
            .unwrap_or_default();
        if seen {
            println!("  {}{}{} {}", prefix, connector, node.dimmed(), "(see above)".dimmed());
            return;
        }
        println!("  {}{}{} {}", prefix, connector, node.bold(), resource_type.cyan());

        let child_prefix = match connector {
            "" => String::new(),
            "└─ " => format!("{}   ", prefix),
            _ => format!("{}│  ", prefix),
        };
        let children = graph.dependents_of(node);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "└─ " } else { "├─ " };
            print_node(stack, graph, child, printed, &child_prefix, connector);
        }
    }

    let mut printed = HashSet::new();
    for resource in agent.stack.resources() {
        if resource.dependencies().is_empty() {
            print_node(&agent.stack, &graph, resource.logical_id(), &mut printed, "", "");
        }
    }
    Ok(())
}

/// Each output's value once every reference in it is recorded
fn resolve_outputs(stack: &Stack, state: Option<&StateFile>) -> Vec<(String, Option<String>)> {
    let known = state.map(StateFile::known_attributes).unwrap_or_default();
    stack
        .outputs()
        .iter()
        .map(|output| (output.name.clone(), stack.resolve(&output.value, &known)))
        .collect()
}

async fn run_outputs(config: &AgentStackConfig, state_path: &Path) -> Result<(), String> {
    let agent = build(config)?;
    let state = read_state(state_path).await?;

    let descriptions: BTreeMap<&str, Option<&str>> = agent
        .stack
        .outputs()
        .iter()
        .map(|o| (o.name.as_str(), o.description.as_deref()))
        .collect();
    for (name, value) in resolve_outputs(&agent.stack, state.as_ref()) {
        let rendered = match value {
            Some(value) => value.green().bold().to_string(),
            None => "(known after deploy)".dimmed().to_string(),
        };
        println!("{} = {}", name.bold(), rendered);
        if let Some(Some(description)) = descriptions.get(name.as_str()) {
            println!("  {}", description.dimmed());
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Recorded state is up-to-date.".green());
        return;
    }

    let mut name_to_effect: HashMap<String, usize> = HashMap::new();
    let mut effect_deps: Vec<Vec<String>> = Vec::new();
    for (idx, effect) in plan.effects().iter().enumerate() {
        name_to_effect.insert(effect.resource_id().name.clone(), idx);
        let deps = match effect {
            Effect::Create(r) | Effect::Update { to: r, .. } => {
                r.dependencies().into_iter().map(str::to_string).collect()
            }
            Effect::Delete(_) => Vec::new(),
        };
        effect_deps.push(deps);
    }

    // Who depends on each effect, so the tree grows from its roots
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (idx, deps) in effect_deps.iter().enumerate() {
        let in_plan: Vec<usize> = deps.iter().filter_map(|d| name_to_effect.get(d).copied()).collect();
        if in_plan.is_empty() {
            roots.push(idx);
        }
        for dep_idx in in_plan {
            dependents.entry(dep_idx).or_default().push(idx);
        }
    }

    println!("{}", "Change Set:".cyan().bold());
    println!();

    fn print_effect_tree(
        idx: usize,
        plan: &Plan,
        dependents: &HashMap<usize, Vec<usize>>,
        printed: &mut HashSet<usize>,
        indent: usize,
        is_last: bool,
        prefix: &str,
    ) {
        if !printed.insert(idx) {
            return;
        }

        let effect = &plan.effects()[idx];
        let colored_symbol = match effect {
            Effect::Create(_) => effect.symbol().green().bold(),
            Effect::Update { .. } => effect.symbol().yellow().bold(),
            Effect::Delete(_) => effect.symbol().red().bold(),
        };
        let connector = if indent == 0 {
            String::new()
        } else if is_last {
            format!("{}└─ ", prefix)
        } else {
            format!("{}├─ ", prefix)
        };
        let continuation = if indent == 0 {
            String::new()
        } else if is_last {
            format!("{}   ", prefix)
        } else {
            format!("{}│  ", prefix)
        };
        let attr_prefix = format!("  {}    ", continuation);

        let id = effect.resource_id();
        println!(
            "  {}{} {} {}",
            connector,
            colored_symbol,
            id.resource_type.cyan().bold(),
            id.name.bold()
        );
        match effect {
            Effect::Create(r) => {
                for (key, value) in r.attributes.iter().filter(|(k, _)| !k.starts_with('_')) {
                    println!("{}{}: {}", attr_prefix, key, format_value(value).green());
                }
            }
            Effect::Update {
                from,
                to,
                changed_attributes,
                ..
            } => {
                for key in changed_attributes {
                    let old = from
                        .attributes
                        .get(key)
                        .map(format_value)
                        .unwrap_or_else(|| "(none)".to_string());
                    let new = to
                        .attributes
                        .get(key)
                        .map(format_value)
                        .unwrap_or_else(|| "(none)".to_string());
                    println!("{}{}: {} → {}", attr_prefix, key, old.red(), new.green());
                }
            }
            Effect::Delete(_) => {}
        }

        let children: Vec<usize> = dependents
            .get(&idx)
            .map(|c| c.iter().copied().filter(|c| !printed.contains(c)).collect())
            .unwrap_or_default();
        for (i, child) in children.iter().enumerate() {
            print_effect_tree(
                *child,
                plan,
                dependents,
                printed,
                indent + 1,
                i == children.len() - 1,
                &continuation,
            );
        }
    }

    let mut printed = HashSet::new();
    for (i, root) in roots.iter().enumerate() {
        print_effect_tree(*root, plan, &dependents, &mut printed, 0, i == roots.len() - 1, "");
    }
    for idx in 0..plan.effects().len() {
        print_effect_tree(idx, plan, &dependents, &mut printed, 0, true, "");
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to create, {} to update, {} to delete.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red()
    );
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(target, attribute) => format!("{}.{}", target, attribute),
        Value::Pseudo(name) => name.clone(),
        Value::Join(parts) => parts.iter().map(format_value).collect::<Vec<_>>().join(" + "),
    }
}

fn print_diff(file: &Path, original: &str, updated: &str) {
    println!("\n{} {}:", "Diff for".cyan().bold(), file.display());

    let diff = TextDiff::from_lines(original, updated);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
    }
}
