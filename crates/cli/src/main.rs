//! Trellis CLI - consultancy project management.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::Mutex;
use trellis_billing::{BasicSettlementManager, SettlementManager};
use trellis_core::{
    Customer, EnquiryId, ProjectId, ProjectStatus, SettlementId, Task, TaskId, TaskPath,
    UserContext,
};
use trellis_intake::{BasicEnquiryDesk, EnquiryDesk, EnquiryPatch, NewEnquiry};
use trellis_progress::{BasicProgressTracker, ProgressTracker};
use trellis_projects::{
    BasicProjectManager, NewProject, NewTask, ProjectManager, ProjectPatch, TaskPatch,
};
use trellis_storage::JsonStorage;
use trellis_time::{BasicTimeTracker, TimeTracker};

mod duration;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Consultancy project management", long_about = None)]
struct Cli {
    /// Storage root (defaults to $TRELLIS_ROOT, then .trellis)
    #[arg(long)]
    root: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage enquiries
    #[command(subcommand)]
    Enquiry(EnquiryCommands),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Manage tasks in a project's tree
    #[command(subcommand)]
    Task(TaskCommands),
    /// Track time against tasks
    #[command(subcommand)]
    Timer(TimerCommands),
    /// Show completion progress
    Progress {
        /// Project id
        project: ProjectId,
        /// Subtree path (slash-joined task ids); whole project if omitted
        #[arg(long)]
        path: Option<TaskPath>,
    },
    /// Show estimated vs. logged effort
    Effort {
        /// Project id
        project: ProjectId,
    },
    /// Manage settlements
    #[command(subcommand)]
    Settle(SettleCommands),
}

#[derive(Args)]
struct CustomerArgs {
    /// Customer name
    #[arg(long, default_value = "")]
    customer: String,
    /// Customer phone
    #[arg(long, default_value = "")]
    phone: String,
    /// Customer address
    #[arg(long, default_value = "")]
    address: String,
}

impl CustomerArgs {
    fn snapshot(self) -> Customer {
        Customer {
            name: self.customer,
            phone: self.phone,
            address: self.address,
        }
    }
}

#[derive(Args)]
struct UserArgs {
    /// Auth user id
    #[arg(long)]
    user: String,
    /// Display name (defaults to the id)
    #[arg(long)]
    name: Option<String>,
    /// Email (defaults to <id>@local)
    #[arg(long)]
    email: Option<String>,
}

impl UserArgs {
    fn context(self) -> UserContext {
        let name = self.name.unwrap_or_else(|| self.user.clone());
        let email = self.email.unwrap_or_else(|| format!("{}@local", self.user));
        UserContext::new(self.user, name, email)
    }
}

#[derive(Subcommand)]
enum EnquiryCommands {
    /// Record a new enquiry
    Add {
        /// What the customer is asking for
        subject: String,
        /// Details
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        customer: CustomerArgs,
    },
    /// List enquiries
    List,
    /// Show one enquiry
    Show {
        /// Enquiry id
        id: EnquiryId,
    },
    /// Mark an enquiry as contacted
    Contacted {
        /// Enquiry id
        id: EnquiryId,
    },
    /// Convert an enquiry into a project
    Convert {
        /// Enquiry id
        id: EnquiryId,
    },
    /// Delete an enquiry without converting it
    Delete {
        /// Enquiry id
        id: EnquiryId,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create an empty project
    Create {
        /// Project name
        name: String,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        customer: CustomerArgs,
    },
    /// List projects
    List,
    /// Show a project and its task tree
    Show {
        /// Project id
        id: ProjectId,
    },
    /// Set project status (not-started | ongoing | completed)
    Status {
        /// Project id
        id: ProjectId,
        /// New status
        status: String,
    },
    /// Delete a project
    Delete {
        /// Project id
        id: ProjectId,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task under a parent (root level by default)
    Add {
        /// Project id
        project: ProjectId,
        /// Task name
        name: String,
        /// Parent path (slash-joined task ids)
        #[arg(long, default_value = "")]
        parent: TaskPath,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
        /// Estimated hours
        #[arg(long)]
        hours: Option<f64>,
        /// Billing rate per hour
        #[arg(long)]
        rate: Option<f64>,
        /// Contribution weight (0-100)
        #[arg(long)]
        weight: Option<u8>,
    },
    /// Show the task addressed by a path
    Show {
        /// Project id
        project: ProjectId,
        /// Path to the task (slash-joined task ids)
        path: TaskPath,
    },
    /// Merge fields into a task
    Edit {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New estimate
        #[arg(long)]
        hours: Option<f64>,
        /// New billing rate
        #[arg(long)]
        rate: Option<f64>,
        /// New weight (0-100)
        #[arg(long)]
        weight: Option<u8>,
    },
    /// Remove a task and its subtree
    Rm {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
    },
    /// Mark a task complete (gated on its children)
    Done {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
    },
    /// Reopen a completed task
    Reopen {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
    },
    /// Bulk-set contribution weights: TASK_ID=WEIGHT ...
    Weights {
        /// Project id
        project: ProjectId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
        /// TASK_ID=WEIGHT pairs
        pairs: Vec<String>,
    },
}

#[derive(Subcommand)]
enum TimerCommands {
    /// Start the clock on a task
    Start {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Stop the clock on a task
    Stop {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Log time retroactively, e.g. "1h 30m"
    Log {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Duration ("45", "45m", "2h", "1h 30m")
        duration: String,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
        #[command(flatten)]
        user: UserArgs,
    },
    /// List a task's time entries
    Entries {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
    },
    /// Per-user time totals on a task
    Summary {
        /// Project id
        project: ProjectId,
        /// Task id (direct child of --parent)
        task: TaskId,
        /// Parent path
        #[arg(long, default_value = "")]
        parent: TaskPath,
    },
}

#[derive(Subcommand)]
enum SettleCommands {
    /// Open a settlement for a project
    Open {
        /// Project id
        project: ProjectId,
    },
    /// Record a payment
    Pay {
        /// Settlement id
        settlement: SettlementId,
        /// Amount
        amount: f64,
        /// Bank or invoice reference
        #[arg(long, default_value = "")]
        reference: String,
    },
    /// Show a settlement
    Show {
        /// Settlement id
        settlement: SettlementId,
    },
    /// List settlements
    List {
        /// Only this project's settlements
        #[arg(long)]
        project: Option<ProjectId>,
    },
    /// Recompute a settlement's total from the current tree
    Refresh {
        /// Settlement id
        settlement: SettlementId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let root = cli
        .root
        .or_else(|| std::env::var_os("TRELLIS_ROOT").map(Into::into))
        .unwrap_or_else(|| std::path::PathBuf::from(".trellis"));
    let storage = Arc::new(Mutex::new(JsonStorage::new(&root).await?));

    match cli.command {
        Commands::Enquiry(cmd) => run_enquiry(cmd, storage).await?,
        Commands::Project(cmd) => run_project(cmd, storage).await?,
        Commands::Task(cmd) => run_task(cmd, storage).await?,
        Commands::Timer(cmd) => run_timer(cmd, storage).await?,
        Commands::Progress { project, path } => {
            let tracker = BasicProgressTracker::shared(storage);
            match path {
                Some(path) => {
                    let progress = tracker.task_progress(project, &path).await?;
                    println!(
                        "task {}: {}/{} tasks complete ({:.0}%)",
                        progress.task_id,
                        progress.completed_tasks,
                        progress.total_tasks,
                        progress.percentage
                    );
                }
                None => {
                    let progress = tracker.project_progress(project).await?;
                    println!(
                        "{}/{} tasks complete ({:.0}%)",
                        progress.completed_tasks, progress.total_tasks, progress.percentage
                    );
                }
            }
        }
        Commands::Effort { project } => {
            let tracker = BasicProgressTracker::shared(storage);
            let effort = tracker.effort(project).await?;
            println!(
                "estimated {:.1}h, logged {:.1}h ({} min)",
                effort.estimated_hours,
                effort.logged_hours(),
                effort.logged_minutes
            );
        }
        Commands::Settle(cmd) => run_settle(cmd, storage).await?,
    }

    Ok(())
}

async fn run_enquiry(cmd: EnquiryCommands, storage: Arc<Mutex<JsonStorage>>) -> Result<()> {
    let mut desk = BasicEnquiryDesk::shared(storage);
    match cmd {
        EnquiryCommands::Add {
            subject,
            description,
            customer,
        } => {
            let enquiry = desk
                .create_enquiry(NewEnquiry {
                    subject,
                    description,
                    customer: customer.snapshot(),
                })
                .await?;
            println!("Recorded {} ({})", enquiry.display_id, enquiry.id);
        }
        EnquiryCommands::List => {
            for e in desk.list_enquiries().await? {
                println!(
                    "{}  {:<9}  {}  [{}]",
                    e.display_id,
                    format!("{:?}", e.status),
                    e.subject,
                    e.id
                );
            }
        }
        EnquiryCommands::Show { id } => {
            let e = desk.get_enquiry(id).await?;
            println!("{} - {} ({:?})", e.display_id, e.subject, e.status);
            println!("customer: {} {} {}", e.customer.name, e.customer.phone, e.customer.address);
            if !e.description.is_empty() {
                println!("{}", e.description);
            }
        }
        EnquiryCommands::Contacted { id } => {
            let e = desk
                .update_enquiry(
                    id,
                    EnquiryPatch {
                        status: Some(trellis_core::EnquiryStatus::Contacted),
                        ..Default::default()
                    },
                )
                .await?;
            println!("{} marked contacted", e.display_id);
        }
        EnquiryCommands::Convert { id } => {
            let project = desk.convert(id).await?;
            println!("Converted into {} ({})", project.display_id, project.id);
        }
        EnquiryCommands::Delete { id } => {
            desk.delete_enquiry(id).await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn run_project(cmd: ProjectCommands, storage: Arc<Mutex<JsonStorage>>) -> Result<()> {
    let mut manager = BasicProjectManager::shared(storage);
    match cmd {
        ProjectCommands::Create {
            name,
            description,
            customer,
        } => {
            let project = manager
                .create_project(NewProject {
                    name,
                    description,
                    customer: customer.snapshot(),
                    due_date: None,
                })
                .await?;
            println!("Created {} ({})", project.display_id, project.id);
        }
        ProjectCommands::List => {
            for p in manager.list_projects().await? {
                println!(
                    "{}  {:<11}  {}  [{}]",
                    p.display_id,
                    format!("{:?}", p.status),
                    p.name,
                    p.id
                );
            }
        }
        ProjectCommands::Show { id } => {
            let p = manager.get_project(id).await?;
            println!("{} - {} ({:?})", p.display_id, p.name, p.status);
            println!("customer: {} {} {}", p.customer.name, p.customer.phone, p.customer.address);
            if !p.description.is_empty() {
                println!("{}", p.description);
            }
            print_tree(&p.tasks, 0);
        }
        ProjectCommands::Status { id, status } => {
            let status = parse_status(&status)
                .with_context(|| format!("unknown status '{}'", status))?;
            manager
                .update_project(
                    id,
                    ProjectPatch {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Status set to {:?}", status);
        }
        ProjectCommands::Delete { id } => {
            manager.delete_project(id).await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

async fn run_task(cmd: TaskCommands, storage: Arc<Mutex<JsonStorage>>) -> Result<()> {
    let mut manager = BasicProjectManager::shared(storage);
    match cmd {
        TaskCommands::Add {
            project,
            name,
            parent,
            description,
            hours,
            rate,
            weight,
        } => {
            let task = manager
                .add_task(
                    project,
                    &parent,
                    NewTask {
                        name,
                        description,
                        estimated_hours: hours,
                        cost_per_hour: rate,
                        deadline: None,
                        assignees: Vec::new(),
                        percentage: weight,
                    },
                )
                .await?;
            println!("Added task {} - {}", task.id, task.name);
        }
        TaskCommands::Show { project, path } => {
            let task = manager.task_at(project, &path).await?;
            let mark = if task.completed { "done" } else { "open" };
            println!("{} - {} ({})", task.id, task.name, mark);
            if !task.description.is_empty() {
                println!("{}", task.description);
            }
            if let Some(hours) = task.estimated_hours {
                println!("estimate: {:.1}h", hours);
            }
            if let Some(rate) = task.cost_per_hour {
                println!("rate: {:.2}/h", rate);
            }
            if let Some(weight) = task.percentage {
                println!("weight: {}%", weight);
            }
            println!(
                "{} child(ren), {} time entr(ies)",
                task.children.len(),
                task.time_entries.len()
            );
        }
        TaskCommands::Edit {
            project,
            task,
            parent,
            name,
            description,
            hours,
            rate,
            weight,
        } => {
            let updated = manager
                .update_task(
                    project,
                    &parent,
                    task,
                    TaskPatch {
                        name,
                        description,
                        estimated_hours: hours,
                        cost_per_hour: rate,
                        deadline: None,
                        assignees: None,
                        percentage: weight,
                    },
                )
                .await?;
            println!("Updated {} - {}", updated.id, updated.name);
        }
        TaskCommands::Rm {
            project,
            task,
            parent,
        } => {
            manager.delete_task(project, &parent, task).await?;
            println!("Removed {} and its subtree", task);
        }
        TaskCommands::Done {
            project,
            task,
            parent,
        } => {
            let done = manager.set_completed(project, &parent, task, true).await?;
            println!("Completed {} - {}", done.id, done.name);
        }
        TaskCommands::Reopen {
            project,
            task,
            parent,
        } => {
            let open = manager.set_completed(project, &parent, task, false).await?;
            println!("Reopened {} - {}", open.id, open.name);
        }
        TaskCommands::Weights {
            project,
            parent,
            pairs,
        } => {
            let mut weights = Vec::new();
            for pair in &pairs {
                weights.push(parse_weight(pair)?);
            }
            manager.set_percentages(project, &parent, &weights).await?;
            println!("Set {} weight(s)", weights.len());
        }
    }
    Ok(())
}

async fn run_timer(cmd: TimerCommands, storage: Arc<Mutex<JsonStorage>>) -> Result<()> {
    let mut tracker = BasicTimeTracker::shared(storage);
    match cmd {
        TimerCommands::Start {
            project,
            task,
            parent,
            user,
        } => {
            let entry = tracker.start(project, &parent, task, &user.context()).await?;
            println!("Started at {} (entry {})", entry.started_at, entry.id);
        }
        TimerCommands::Stop {
            project,
            task,
            parent,
            user,
        } => {
            let entry = tracker.stop(project, &parent, task, &user.context()).await?;
            println!("Stopped: {} minute(s)", entry.minutes);
        }
        TimerCommands::Log {
            project,
            task,
            duration,
            parent,
            user,
        } => {
            let minutes = duration::parse_minutes(&duration)?;
            let entry = tracker
                .log(project, &parent, task, &user.context(), minutes)
                .await?;
            println!("Logged: entry {} now at {} minute(s)", entry.id, entry.minutes);
        }
        TimerCommands::Entries {
            project,
            task,
            parent,
        } => {
            for e in tracker.entries(project, &parent, task).await? {
                let state = match e.ended_at {
                    Some(ended) => format!("{} min (ended {})", e.minutes, ended),
                    None => "running".to_string(),
                };
                println!("{}  {}  {}  {}", e.id, e.user_name, e.started_at, state);
            }
        }
        TimerCommands::Summary {
            project,
            task,
            parent,
        } => {
            for total in tracker.summary(project, &parent, task).await? {
                println!("{:<20} {} min", total.user_name, total.minutes);
            }
        }
    }
    Ok(())
}

async fn run_settle(cmd: SettleCommands, storage: Arc<Mutex<JsonStorage>>) -> Result<()> {
    let mut manager = BasicSettlementManager::shared(storage);
    match cmd {
        SettleCommands::Open { project } => {
            let settlement = manager.open_settlement(project).await?;
            println!(
                "Opened settlement {} at total {:.2}",
                settlement.id, settlement.total
            );
        }
        SettleCommands::Pay {
            settlement,
            amount,
            reference,
        } => {
            let updated = manager.record_payment(settlement, amount, reference).await?;
            println!(
                "Paid {:.2}/{:.2} ({:?})",
                updated.paid(),
                updated.total,
                updated.status()
            );
        }
        SettleCommands::Show { settlement } => {
            let s = manager.get_settlement(settlement).await?;
            println!(
                "{}  project {}  {:.2}/{:.2}  {:?}",
                s.id,
                s.project_id,
                s.paid(),
                s.total,
                s.status()
            );
            for p in &s.payments {
                println!("  {}  {:.2}  {}  {}", p.paid_at, p.amount, p.reference, p.id);
            }
        }
        SettleCommands::List { project } => {
            for s in manager.list_settlements(project).await? {
                println!(
                    "{}  project {}  {:.2}/{:.2}  {:?}",
                    s.id,
                    s.project_id,
                    s.paid(),
                    s.total,
                    s.status()
                );
            }
        }
        SettleCommands::Refresh { settlement } => {
            let s = manager.refresh_total(settlement).await?;
            println!("Total refreshed to {:.2}", s.total);
        }
    }
    Ok(())
}

fn print_tree(tasks: &[Task], depth: usize) {
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        let weight = task
            .percentage
            .map(|p| format!(" {}%", p))
            .unwrap_or_default();
        println!(
            "{}[{}] {}  {}{}",
            "  ".repeat(depth + 1),
            mark,
            task.name,
            task.id,
            weight
        );
        print_tree(&task.children, depth + 1);
    }
}

fn parse_status(s: &str) -> Option<ProjectStatus> {
    match s {
        "not-started" => Some(ProjectStatus::NotStarted),
        "ongoing" => Some(ProjectStatus::Ongoing),
        "completed" => Some(ProjectStatus::Completed),
        _ => None,
    }
}

fn parse_weight(pair: &str) -> Result<(TaskId, u8)> {
    let (id, weight) = pair
        .split_once('=')
        .with_context(|| format!("expected TASK_ID=WEIGHT, got '{}'", pair))?;
    Ok((id.parse()?, weight.parse()?))
}
