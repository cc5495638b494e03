fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = imdb_backup::cli::Args::parse();
    imdb_backup::cli::init_logging(&args);
    let code = match imdb_backup::cli::run(&args) {
        Ok(_) => 0,
        Err(e) => {
            tracing::error!("{}", e);
            if args.verbose {
                let mut source = e.source();
                while let Some(s) = source {
                    tracing::error!("  cause: {}", s);
                    source = s.source();
                }
            }
            e.exit_code()
        }
    };
    if imdb_backup::cli::pause_requested(&args) {
        imdb_backup::cli::pause_before_exit();
    }
    std::process::exit(code);
}
