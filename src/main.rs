//! blog-ops-agent entry point
//!
//! Usage:
//! - `blog-ops-agent update` - refresh proxy source, restart if it was running
//! - `blog-ops-agent publish [message...]` - regenerate the site and push;
//!   trailing words become the commit message
//! - `blog-ops-agent serve [--port N]` - run the HTTP agent
//! - Plain `blog-ops-agent` runs the agent on the configured port

use blog_ops_agent::domain::WorkflowKind;
use blog_ops_agent::RuntimeOptions;

enum Invocation {
    Agent(RuntimeOptions),
    Workflow(WorkflowKind, Option<String>),
    Help,
}

fn parse_args() -> Invocation {
    let args: Vec<String> = std::env::args().collect();
    let mut options = RuntimeOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                options.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                return Invocation::Help;
            }
            "serve" => {
                i += 1;
            }
            "update" => {
                return Invocation::Workflow(WorkflowKind::Update, None);
            }
            "publish" => {
                // everything after the subcommand is the commit message
                let words = &args[i + 1..];
                let message = if words.is_empty() {
                    None
                } else {
                    Some(words.join(" "))
                };
                return Invocation::Workflow(WorkflowKind::Publish, message);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                return Invocation::Help;
            }
        }
    }

    Invocation::Agent(options)
}

fn print_help() {
    println!("blog-ops-agent - blog maintenance agent");
    println!();
    println!("USAGE:");
    println!("    blog-ops-agent [OPTIONS] [COMMAND]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the agent listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("COMMANDS:");
    println!("    serve                  Run the HTTP agent (default)");
    println!("    update                 Refresh proxy source and restart the service");
    println!("    publish [message...]   Regenerate the site and push, with an");
    println!("                           optional commit message");
    println!();
    println!("EXAMPLES:");
    println!("    blog-ops-agent update");
    println!("    blog-ops-agent publish new post: on static sites");
    println!("    blog-ops-agent serve --port 9810");
}

/// Map a workflow exit code to a process exit status: commands' own codes
/// pass through, internal failures become 1
fn process_exit_code(code: i32) -> i32 {
    match code {
        0 => 0,
        c if (1..=255).contains(&c) => c,
        _ => 1,
    }
}

fn main() {
    blog_ops_agent::init_tracing();

    let invocation = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    match invocation {
        Invocation::Help => {
            print_help();
        }
        Invocation::Workflow(kind, message) => {
            let code = rt.block_on(blog_ops_agent::run_workflow_once(kind, message));
            std::process::exit(process_exit_code(code));
        }
        Invocation::Agent(options) => {
            if let Err(e) = rt.block_on(blog_ops_agent::run_agent(options)) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
