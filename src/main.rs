//! Prodichat - chat with a Gemini-backed bot from the terminal.
//!
//! This is the main entry point for the prodichat CLI tool.

use std::env;
use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;

use prodichat::{
    AppSettings, AuthClient, AuthConfig, AuthSession, AuthWatcher, ChatEvent, ChatSession,
    FirestoreConfig, FirestoreStore, GeminiClient, GeminiConfig, GenerateTransport, MemoryStore,
    MessageStore, ResponseFetcher, SenderTag,
};

/// How a chat loop ended.
enum LoopOutcome {
    Quit,
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut settings = AppSettings::load();
    apply_env_overrides(&mut settings);

    println!("💬 Prodichat - Gemini-backed chatbot");
    println!("================================================");
    println!("Model: {}", settings.model_name);
    println!(
        "Retry: {} attempts, {}ms initial delay, x{} backoff",
        settings.max_attempts, settings.initial_delay_ms, settings.backoff_multiplier
    );
    if settings.project_id.is_empty() {
        println!("History: in-memory (set FIRESTORE_PROJECT_ID to persist)");
    } else {
        println!(
            "History: project {} / app {}",
            settings.project_id, settings.app_id
        );
    }
    println!("================================================\n");

    let auth_token = (!settings.auth_token.is_empty()).then(|| settings.auth_token.clone());
    let auth = AuthWatcher::new(
        AuthClient::new(AuthConfig::default().with_api_key(&settings.auth_api_key)),
        auth_token,
    );

    let stdin = io::stdin();
    loop {
        let session = match login_screen(&auth, &stdin).await? {
            Some(session) => session,
            None => break,
        };

        let who = session
            .email
            .clone()
            .unwrap_or_else(|| format!("guest ({})", session.user_id));
        println!("\n✅ Signed in as {}", who);

        let gemini = GeminiClient::new(
            GeminiConfig::default()
                .with_api_key(&settings.api_key)
                .with_model_name(&settings.model_name),
        );
        let fetcher = ResponseFetcher::new(gemini, settings.retry_policy());

        let outcome = if settings.project_id.is_empty() {
            let (chat, events) = ChatSession::new(fetcher, MemoryStore::new());
            chat_loop(chat, events, &stdin).await?
        } else {
            let store = FirestoreStore::new(
                FirestoreConfig::default()
                    .with_api_key(&settings.auth_api_key)
                    .with_project_id(&settings.project_id)
                    .with_app_id(&settings.app_id),
                &session,
            );
            let (chat, events) = ChatSession::new(fetcher, store);
            chat_loop(chat, events, &stdin).await?
        };

        match outcome {
            LoopOutcome::Quit => break,
            LoopOutcome::Logout => auth.sign_out(),
        }
    }

    println!("Goodbye! 👋");
    Ok(())
}

/// Override persisted settings from environment variables.
fn apply_env_overrides(settings: &mut AppSettings) {
    if let Ok(v) = env::var("GEMINI_API_KEY") {
        settings.api_key = v;
    }
    if let Ok(v) = env::var("GEMINI_MODEL") {
        settings.model_name = v;
    }
    if let Ok(v) = env::var("AUTH_API_KEY") {
        settings.auth_api_key = v;
    }
    if let Ok(v) = env::var("FIRESTORE_PROJECT_ID") {
        settings.project_id = v;
    }
    if let Ok(v) = env::var("CHAT_APP_ID") {
        settings.app_id = v;
    }
    if let Ok(v) = env::var("INITIAL_AUTH_TOKEN") {
        settings.auth_token = v;
    }
    if let Some(v) = env::var("CHAT_MAX_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        settings.max_attempts = v;
    }
    if let Some(v) = env::var("CHAT_INITIAL_DELAY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        settings.initial_delay_ms = v;
    }
    if let Some(v) = env::var("CHAT_BACKOFF_MULTIPLIER")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        settings.backoff_multiplier = v;
    }
}

/// The login screen: email login/signup, or guest sign-in through the
/// token-then-anonymous fallback chain. Returns None when the user quits.
async fn login_screen(
    auth: &AuthWatcher,
    stdin: &io::Stdin,
) -> anyhow::Result<Option<AuthSession>> {
    println!("Type 'login' or 'signup', or press Enter to continue as guest ('quit' to exit).");

    loop {
        let choice = prompt_line(stdin, "🔐 > ")?;
        match choice.as_str() {
            "quit" | "exit" => return Ok(None),
            "login" | "signup" => {
                let email = prompt_line(stdin, "Email: ")?;
                let password = prompt_line(stdin, "Password: ")?;
                let result = if choice == "login" {
                    auth.sign_in(&email, &password).await
                } else {
                    auth.sign_up(&email, &password).await
                };
                match result {
                    Ok(session) => return Ok(Some(session)),
                    Err(e) => eprintln!("❌ {}", e.user_message()),
                }
            }
            "" | "guest" => match auth.ensure_signed_in().await {
                Ok(session) => return Ok(Some(session)),
                Err(e) => eprintln!("❌ {}", e.user_message()),
            },
            other => println!("Unknown command: {}", other),
        }
    }
}

/// The chat screen: replay persisted history, then read/send until the user
/// logs out or quits. Input stays blocked while a reply is outstanding.
async fn chat_loop<T, S>(
    mut chat: ChatSession<T, S>,
    mut events: mpsc::UnboundedReceiver<ChatEvent>,
    stdin: &io::Stdin,
) -> anyhow::Result<LoopOutcome>
where
    T: GenerateTransport,
    S: MessageStore,
{
    render(&mut events);

    chat.load_history().await;
    let history = chat.history().borrow().clone();
    if !history.is_empty() {
        println!("\n----- previous messages -----");
        for message in &history {
            print_message(&message.text, message.sender);
        }
        println!("-----------------------------");
    }

    println!("\nType a message and press Enter. 'logout' to sign out, 'quit' to exit.\n");

    loop {
        print!("💬 > ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(LoopOutcome::Quit);
        }

        match line.trim() {
            "quit" | "exit" => return Ok(LoopOutcome::Quit),
            "logout" => return Ok(LoopOutcome::Logout),
            input => {
                if chat.send_message(input).await.is_none() {
                    continue;
                }
                render(&mut events);
            }
        }
    }
}

/// Print everything the session pushed to the display stream.
fn render(events: &mut mpsc::UnboundedReceiver<ChatEvent>) {
    while let Ok(ChatEvent::Message { text, sender }) = events.try_recv() {
        print_message(&text, sender);
    }
}

fn print_message(text: &str, sender: SenderTag) {
    match sender {
        SenderTag::User => println!("🧑 {}", text),
        SenderTag::Bot => println!("🤖 {}", text),
    }
}

fn prompt_line(stdin: &io::Stdin, prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
