use std::io::{self, BufRead, Write};
use std::sync::Arc;
use teller_agent::{
    audit::AuditLog, config::AppConfig, conversation::ConversationEngine,
    reference::ReferenceData, Session,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let reference = match &config.reference_data_path {
        Some(path) => ReferenceData::from_json_file(path)?,
        None => ReferenceData::builtin(),
    };

    let audit = Arc::new(AuditLog::with_capacity(config.audit_log_capacity));
    let engine = ConversationEngine::new(Arc::new(reference), audit)
        .with_max_attempts(config.max_verification_attempts);
    let mut session = Session::new(Uuid::new_v4());

    info!("Teller Agent terminal session started");
    println!("Bank customer service. Type 'reset' to log out, 'quit' to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("you> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => {
                engine.reset_verification(&mut session);
                println!("bot> Verification cleared.\n");
            }
            text => {
                let reply = engine.process_message(&mut session, text);
                println!("bot> {}\n", reply);
            }
        }
    }

    println!("Goodbye. {} turn(s) this session.", session.history().len());
    Ok(())
}
