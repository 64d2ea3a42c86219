use clap::Parser;
use miette::Result;
use lagerkoll::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Terminate silently on a closed pipe (`lagerkoll list | head`).
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    use lagerkoll::cli::commands::*;
    match cli.command {
        Commands::Init(args) => init::run(args),
        Commands::List(args) => list::run(args, &global),
        Commands::Facets(args) => facets::run(args, &global),
        Commands::Show(args) => show::run(args, &global),
        Commands::Validate(args) => validate::run(args, &global),
        Commands::Seed(args) => seed::run_seed(args, &global),
        Commands::Sync(args) => seed::run_sync(args, &global),
        Commands::Store(cmd) => store::run(cmd, &global),
        Commands::Browse(args) => browse::run(args, &global),
        Commands::Schema(args) => schema::run(args, &global),
        Commands::Config(args) => config::run(args, &global),
        Commands::Completions(args) => completions::run(args),
    }
}

/// Diagnostics go to stderr so piped output stays clean.
/// `RUST_LOG` wins over `-v`/`-q`.
fn init_tracing(global: &GlobalOpts) {
    let default = if global.verbose {
        "lagerkoll=debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
