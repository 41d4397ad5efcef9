use anyhow::Result;
use std::io::{self, BufRead, Write};

use natter_client::{ChatClient, SendOptions, SendOutcome};
use natter_core::config::{AppConfig, Plugin};
use natter_core::message::{Message, MessageRole};
use natter_store::SessionStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Read a line from stdin, handling non-UTF-8 bytes gracefully.
/// Returns None on EOF.
fn read_line_lossy() -> Result<Option<String>> {
    let stdin = io::stdin();
    let mut buf = Vec::new();
    match stdin.lock().read_until(b'\n', &mut buf) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(String::from_utf8_lossy(&buf).trim().to_string())),
        Err(e) => Err(anyhow::anyhow!("Input error: {e}")),
    }
}

fn read_prompt() -> Result<Option<String>> {
    eprint!("  \x1b[1;32mnatter>\x1b[0m ");
    io::stderr().flush().ok();
    read_line_lossy()
}

/// Drives one send to completion, printing the reply as it streams.
/// Ctrl-C requests cancellation; the stream settles at the next chunk
/// boundary with whatever partial text already landed.
async fn send_and_render(
    client: &mut ChatClient,
    store: &mut SessionStore,
    message: Message,
    truncate_count: usize,
    plugin: Option<Plugin>,
) -> SendOutcome {
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(super::output::render_deltas(rx));

    let options = SendOptions {
        truncate_count,
        plugin,
        delta_tx: Some(tx),
    };
    let send_fut = client.send(store, message, options, &cancel);
    tokio::pin!(send_fut);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send_fut => break outcome,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                eprintln!("\n  \x1b[33mStopping...\x1b[0m");
            }
        }
    };
    printer.await.ok();

    match outcome {
        SendOutcome::Success => println!(),
        SendOutcome::Aborted => eprintln!("\n  \x1b[33m[stopped]\x1b[0m"),
        SendOutcome::Failed => {}
    }
    outcome
}

/// For the plugin path there is no stream; print the settled reply.
fn print_plugin_reply(store: &mut SessionStore) {
    if let Some(last) = store.current_session().messages.last() {
        if last.role == MessageRole::Assistant {
            println!("{}", last.content);
        }
    }
}

/// Non-interactive: one message, one reply, exit.
pub async fn send_once(
    client: &mut ChatClient,
    store: &mut SessionStore,
    prompt: String,
) -> Result<()> {
    let outcome =
        send_and_render(client, store, Message::new_user(prompt), 0, None).await;
    if outcome == SendOutcome::Failed {
        anyhow::bail!("request failed");
    }
    Ok(())
}

/// Resolve a 1-based session number typed by the user.
fn parse_index(arg: Option<&str>, len: usize) -> Option<usize> {
    let n = arg?.parse::<usize>().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

fn print_help() {
    eprintln!("\n  \x1b[1mCommands:\x1b[0m");
    eprintln!("    /new             Start a new session");
    eprintln!("    /sessions        List sessions");
    eprintln!("    /select N        Switch to session N");
    eprintln!("    /next, /prev     Cycle through sessions");
    eprintln!("    /move FROM TO    Reorder sessions");
    eprintln!("    /delete [N]      Delete a session (current by default)");
    eprintln!("    /undo            Restore the last deleted session");
    eprintln!("    /rename TOPIC    Rename the current session");
    eprintln!("    /regen           Regenerate the last reply");
    eprintln!("    /reset           Clear the current session's messages");
    eprintln!("    /clear           Delete all sessions");
    eprintln!("    /wipe            Delete all sessions and stored data");
    eprintln!("    /plugin [ID|off] Route sends through a plugin");
    eprintln!("    /exit            Exit\n");
}

pub async fn run(
    client: &mut ChatClient,
    store: &mut SessionStore,
    config: &AppConfig,
) -> Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[1;35mNatter\x1b[0m v{} \x1b[90m(\x1b[1;36m{}\x1b[90m)\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        config.model,
    );
    eprintln!("  \x1b[90mType a message, /help for commands, Ctrl-D to exit\x1b[0m");
    eprintln!();

    let mut active_plugin: Option<Plugin> = None;

    loop {
        let line = match read_prompt()? {
            None => {
                eprintln!("\n  \x1b[90mGoodbye!\x1b[0m");
                break;
            }
            Some(line) if line.is_empty() => continue,
            Some(line) => line,
        };

        if let Some(rest) = line.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            let command = parts.next().unwrap_or_default();
            match command {
                "help" | "h" => print_help(),
                "exit" | "quit" | "q" => {
                    eprintln!("  \x1b[90mGoodbye!\x1b[0m");
                    break;
                }
                "new" => {
                    store.new_session();
                    eprintln!("  \x1b[32m✓\x1b[0m New session started.\n");
                }
                "sessions" | "s" => {
                    super::output::render_session_list(
                        store.sessions(),
                        store.current_session_index(),
                    );
                }
                "select" => {
                    match parse_index(parts.next(), store.sessions().len()) {
                        Some(index) => {
                            store.select_session(index);
                            eprintln!(
                                "  \x1b[32m✓\x1b[0m Now in \x1b[1m{}\x1b[0m\n",
                                store.current_session().topic
                            );
                        }
                        None => eprintln!("  Usage: /select N (see /sessions)\n"),
                    }
                }
                "next" => {
                    store.next_session(1);
                    eprintln!(
                        "  \x1b[32m✓\x1b[0m Now in \x1b[1m{}\x1b[0m\n",
                        store.current_session().topic
                    );
                }
                "prev" => {
                    store.next_session(-1);
                    eprintln!(
                        "  \x1b[32m✓\x1b[0m Now in \x1b[1m{}\x1b[0m\n",
                        store.current_session().topic
                    );
                }
                "move" => {
                    let len = store.sessions().len();
                    match (
                        parse_index(parts.next(), len),
                        parse_index(parts.next(), len),
                    ) {
                        (Some(from), Some(to)) => {
                            store.move_session(from, to);
                            super::output::render_session_list(
                                store.sessions(),
                                store.current_session_index(),
                            );
                        }
                        _ => eprintln!("  Usage: /move FROM TO\n"),
                    }
                }
                "delete" | "d" => {
                    let index = match parts.next() {
                        Some(arg) => match parse_index(Some(arg), store.sessions().len()) {
                            Some(index) => index,
                            None => {
                                eprintln!("  No such session.\n");
                                continue;
                            }
                        },
                        None => store.current_session_index(),
                    };
                    store.delete_session(index);
                    eprintln!();
                }
                "undo" => {
                    if store.undo_delete() {
                        eprintln!("  \x1b[32m✓\x1b[0m Session restored.\n");
                    } else {
                        eprintln!("  Nothing to undo.\n");
                    }
                }
                "rename" => {
                    let topic = parts.collect::<Vec<_>>().join(" ");
                    if topic.is_empty() {
                        eprintln!("  Usage: /rename TOPIC\n");
                    } else {
                        store.update_current_session(|s| s.topic = topic);
                        eprintln!("  \x1b[32m✓\x1b[0m Renamed.\n");
                    }
                }
                "regen" => {
                    // resend from the last user turn, dropping it and
                    // everything after it
                    let session = store.current_session();
                    let target = session
                        .messages
                        .iter()
                        .rposition(|m| m.role == MessageRole::User)
                        .map(|i| (session.messages[i].clone(), session.messages.len() - i));
                    match target {
                        Some((message, truncate)) => {
                            eprintln!();
                            let resend = Message::new_user(message.content);
                            send_and_render(client, store, resend, truncate, None).await;
                            eprintln!();
                        }
                        None => eprintln!("  Nothing to regenerate.\n"),
                    }
                }
                "reset" => {
                    store.reset_session();
                    eprintln!("  \x1b[32m✓\x1b[0m Session cleared.\n");
                }
                "clear" => {
                    store.clear_sessions();
                    eprintln!("  \x1b[32m✓\x1b[0m All sessions deleted.\n");
                }
                "wipe" => {
                    store.clear_all_data();
                    eprintln!("  \x1b[32m✓\x1b[0m All sessions and stored data deleted.\n");
                }
                "plugin" => match parts.next() {
                    Some("off") => {
                        active_plugin = None;
                        eprintln!("  \x1b[32m✓\x1b[0m Plugin disabled.\n");
                    }
                    Some(id) => match config.plugin(id) {
                        Some(plugin) => {
                            eprintln!(
                                "  \x1b[32m✓\x1b[0m Using plugin \x1b[1m{}\x1b[0m\n",
                                plugin.name
                            );
                            active_plugin = Some(plugin.clone());
                        }
                        None => eprintln!("  No plugin with that id in the config.\n"),
                    },
                    None => {
                        if config.plugins.is_empty() {
                            eprintln!("  No plugins configured.\n");
                        } else {
                            for p in &config.plugins {
                                eprintln!("    \x1b[1m{}\x1b[0m  {}", p.id, p.name);
                            }
                            eprintln!();
                        }
                    }
                },
                _ => eprintln!("  Unknown command. Type /help\n"),
            }
            continue;
        }

        eprintln!();
        let message = Message::new_user(line);
        let plugin = active_plugin.clone();
        let via_plugin = plugin.is_some();
        let outcome = send_and_render(client, store, message, 0, plugin).await;
        if via_plugin && outcome == SendOutcome::Success {
            print_plugin_reply(store);
        }
        eprintln!();
    }

    Ok(())
}
