use std::collections::HashSet;

use anyhow::{bail, Context, Result};

use crate::activity::ActivityLog;
use crate::config::{self, AppConfig};
use crate::model::mutation::MutationResult;
use crate::model::work_item::{WorkItem, WorkItemType};
use crate::pipeline::dedupe::duplicate_batch;
use crate::pipeline::reconcile::{RenderSink, ViewReconciler};
use crate::pipeline::{run_batch, run_instruction_with_context, InstructionOutcome};
use crate::session::Session;
use crate::store::{fetch_snapshot, ItemQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dashboard,
    Projects,
    List {
        project: Option<String>,
        query: ItemQuery,
    },
    Chat {
        project: Option<String>,
        instruction: String,
    },
    Dedupe {
        project: Option<String>,
        apply: bool,
    },
    History {
        limit: usize,
    },
    Help,
}

const DEFAULT_HISTORY: usize = 20;

/// Parse everything after the binary name.
///
/// Supported forms:
///   devops
///   devops projects
///   devops list [-p PROJECT] [-t TYPE] [-u USER]
///   devops chat [-p PROJECT] <instruction...>
///   devops dedupe [-p PROJECT] [--apply]
///   devops history [-n COUNT]
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        return Ok(Command::Dashboard);
    };

    let mut project = None;
    let mut item_type = None;
    let mut user = None;
    let mut apply = false;
    let mut limit = DEFAULT_HISTORY;
    let mut words: Vec<String> = Vec::new();
    let mut i = 0;

    while i < rest.len() {
        match rest[i].as_str() {
            flag @ ("-p" | "--project" | "-t" | "--type" | "-u" | "--user" | "-n" | "--limit") => {
                i += 1;
                let Some(value) = rest.get(i) else {
                    bail!("Missing value for {flag}");
                };
                match flag {
                    "-p" | "--project" => project = Some(value.clone()),
                    "-t" | "--type" => item_type = parse_type(value)?,
                    "-u" | "--user" => user = Some(value.clone()),
                    _ => {
                        limit = value
                            .parse()
                            .with_context(|| format!("Invalid count for {flag}: {value}"))?
                    }
                }
            }
            "--apply" => apply = true,
            word => words.push(word.to_string()),
        }
        i += 1;
    }

    match command.as_str() {
        "projects" => Ok(Command::Projects),
        "list" | "ls" => Ok(Command::List {
            project,
            query: ItemQuery {
                item_type,
                assigned_to: user,
            },
        }),
        "chat" | "do" => {
            let instruction = words.join(" ");
            if instruction.trim().is_empty() {
                bail!("Usage: devops chat [-p <project>] <instruction>\n\nExample:\n  devops chat \"create a login page under the Auth epic\"");
            }
            Ok(Command::Chat {
                project,
                instruction,
            })
        }
        "dedupe" => Ok(Command::Dedupe { project, apply }),
        "history" => Ok(Command::History { limit }),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command: {other}. Run `devops help` for usage."),
    }
}

fn parse_type(raw: &str) -> Result<Option<WorkItemType>> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    match WorkItemType::parse(raw) {
        WorkItemType::Other(name) => {
            bail!("Unknown work item type: {name}. Use Task, Epic, Feature, \"User Story\", Bug or all.")
        }
        known => Ok(Some(known)),
    }
}

/// Run a one-shot command. The dashboard is started by `main`.
pub async fn run(command: Command) -> Result<()> {
    run_with(command, &ActivityLog::default_location(), config::load_config).await
}

/// Config is loaded only by commands that talk to a service, so help and
/// history keep working when the file is broken.
async fn run_with(
    command: Command,
    activity: &ActivityLog,
    load_config: impl Fn() -> Result<AppConfig>,
) -> Result<()> {
    match command {
        Command::Dashboard | Command::Help => {
            print_help();
            Ok(())
        }
        Command::History { limit } => {
            print_history(activity, limit);
            Ok(())
        }
        Command::Projects => {
            let config = load_config()?;
            let session = Session::from_config(&config)?;
            let projects = session.store.list_projects().await?;
            for project in projects {
                let marker = if config.last_project.as_deref() == Some(project.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {project}");
            }
            Ok(())
        }
        Command::List { project, query } => {
            let config = load_config()?;
            let session = Session::from_config(&config)?;
            let project = choose_project(project, &config)?;
            let items = fetch_snapshot(session.store.as_ref(), &project, &query).await?;
            print_items(&items);
            Ok(())
        }
        Command::Chat {
            project,
            instruction,
        } => {
            let config = load_config()?;
            let session = Session::from_config(&config)?;
            let project = choose_project(project, &config)?;
            let context =
                fetch_snapshot(session.store.as_ref(), &project, &ItemQuery::default()).await?;
            let outcome = run_instruction_with_context(
                &session,
                &project,
                &instruction,
                &context,
                &ItemQuery::default(),
            )
            .await?;
            report(activity, &project, &instruction, &context, outcome)
        }
        Command::Dedupe { project, apply } => {
            let config = load_config()?;
            let session = Session::from_config(&config)?;
            let project = choose_project(project, &config)?;
            let context =
                fetch_snapshot(session.store.as_ref(), &project, &ItemQuery::default()).await?;
            let batch = duplicate_batch(&context);
            if batch.items().is_empty() {
                println!("No duplicates found in {project}.");
                return Ok(());
            }
            if !apply {
                println!("Would delete {} duplicate(s):", batch.len());
                print_items(batch.items());
                println!("\nRe-run with --apply to delete them.");
                return Ok(());
            }
            let outcome = run_batch(&session, &project, batch, &context, &ItemQuery::default()).await;
            report(activity, &project, "dedupe", &context, outcome)
        }
    }
}

fn choose_project(explicit: Option<String>, config: &AppConfig) -> Result<String> {
    match explicit {
        Some(project) => {
            if let Err(err) = config::remember_project(&project) {
                tracing::warn!(error = %err, "could not save project choice");
            }
            Ok(project)
        }
        None => match &config.last_project {
            Some(project) => Ok(project.clone()),
            None => bail!("No project selected. Pass -p <project> (see `devops projects`)."),
        },
    }
}

fn report(
    activity: &ActivityLog,
    project: &str,
    instruction: &str,
    context: &[WorkItem],
    outcome: InstructionOutcome,
) -> Result<()> {
    if outcome.batch.is_none() {
        println!("Nothing to change.");
        return Ok(());
    }

    println!("{} ({} item(s))", outcome.batch.action(), outcome.batch.len());
    for result in &outcome.results {
        print_result(result);
    }
    if let Err(err) = activity.append(project, instruction, &outcome.results) {
        tracing::warn!(error = %err, "could not write activity log");
    }

    let failures = outcome.failures();
    if let Some(snapshot) = outcome.snapshot {
        println!();
        let seen: HashSet<u32> = context.iter().map(|item| item.id).collect();
        ViewReconciler::seeded(StdoutSink, seen).render(snapshot);
    }

    if failures > 0 {
        bail!("{failures} of {} mutation(s) failed", outcome.results.len());
    }
    Ok(())
}

fn print_result(result: &MutationResult) {
    let mark = if result.is_success() { "ok  " } else { "FAIL" };
    println!("  {mark} {}", result.summary());
    for warning in &result.warnings {
        println!("       warning: {warning}");
    }
}

fn print_history(log: &ActivityLog, limit: usize) {
    let entries = log.read(Some(limit));
    if entries.is_empty() {
        println!("No activity yet.");
        return;
    }
    for entry in entries {
        println!("{}  [{}]  {}", entry.timestamp, entry.project, entry.result.summary());
    }
}

/// Prints each reconciled list as a table; new rows are starred.
struct StdoutSink;

impl RenderSink for StdoutSink {
    fn send(&self, items: Vec<WorkItem>) {
        print_items(&items);
    }
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let head: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{head}…")
}

fn print_items(items: &[WorkItem]) {
    if items.is_empty() {
        println!("(no work items)");
        return;
    }
    println!(
        "  {:<7} {:<11} {:<12} {:<18} TITLE",
        "ID", "TYPE", "STATE", "ASSIGNEE"
    );
    for item in items {
        let marker = if item.is_new { "*" } else { " " };
        let parent = item
            .parent_label()
            .map(|parent| format!("  (parent: {parent})"))
            .unwrap_or_default();
        println!(
            "{marker} {:<7} {:<11} {:<12} {:<18} {}{parent}",
            item.id,
            clip(item.type_label(), 11),
            clip(item.state.as_deref().unwrap_or_default(), 12),
            clip(item.assignee_label(), 18),
            item.title,
        );
    }
}

pub fn print_help() {
    println!("devops: manage Azure DevOps work items in plain language\n");
    println!("USAGE:");
    println!("  devops                          Launch the dashboard");
    println!("  devops projects                 List projects");
    println!("  devops list [options]           Print the work items of a project");
    println!("  devops chat [-p <project>] <instruction>");
    println!("                                  Apply an instruction and print the results");
    println!("  devops dedupe [-p <project>] [--apply]");
    println!("                                  Find (and delete) items with duplicate titles");
    println!("  devops history [-n <count>]     Show recent mutations");
    println!();
    println!("OPTIONS:");
    println!("  -p, --project <name>  Project to work on (defaults to the last one used)");
    println!("  -t, --type <type>     Task, Epic, Feature, \"User Story\", Bug or all");
    println!("  -u, --user <name>     Only items assigned to this person");
    println!();
    println!("EXAMPLES:");
    println!("  devops chat -p Web \"create all form controls under the Forms epic\"");
    println!("  devops chat \"move the login task under Authentication\"");
    println!("  devops list -t bug -u \"Ana Lopez\"");
}
