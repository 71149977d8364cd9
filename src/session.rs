use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::api::Transport;
use crate::controller::{Dashboard, Debouncer};
use crate::filters::{FilterEdit, QueueFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Set { key: String, value: String },
    Next,
    Prev,
    Refresh,
    Show,
    Quit,
}

pub fn parse_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if let Some((key, value)) = line.split_once('=') {
        return Some(SessionCommand::Set {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        });
    }
    match line {
        "next" | "n" => Some(SessionCommand::Next),
        "prev" | "p" => Some(SessionCommand::Prev),
        "refresh" | "r" => Some(SessionCommand::Refresh),
        "show" | "s" => Some(SessionCommand::Show),
        "quit" | "q" | "exit" => Some(SessionCommand::Quit),
        _ => None,
    }
}

/// Drives the dashboard from line commands until `quit` or end of input.
///
/// Queue filter edits are debounced; only the value that settles triggers a
/// page-zero fetch. Refresh and paging run immediately.
pub async fn run<T, R, F>(
    dash: &mut Dashboard,
    transport: &T,
    input: R,
    mut render: F,
) -> anyhow::Result<()>
where
    T: Transport,
    R: AsyncBufRead + Unpin,
    F: FnMut(&Dashboard),
{
    let mut lines = input.lines();
    let mut debouncer: Debouncer<QueueFilter> = Debouncer::new(dash.config.debounce);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(SessionCommand::Set { key, value }) => {
                        match dash.filters.apply(&key, &value) {
                            Some(FilterEdit::Queue) => debouncer.schedule(dash.filters.queue.clone()),
                            Some(FilterEdit::View) => render(dash),
                            None => warn!(%key, "unknown filter"),
                        }
                    }
                    Some(SessionCommand::Next) => {
                        if dash.next_page(transport).await {
                            render(dash);
                        }
                    }
                    Some(SessionCommand::Prev) => {
                        if dash.prev_page(transport).await {
                            render(dash);
                        }
                    }
                    Some(SessionCommand::Refresh) => {
                        debouncer.cancel();
                        dash.refresh(transport).await;
                        render(dash);
                    }
                    Some(SessionCommand::Show) => render(dash),
                    Some(SessionCommand::Quit) => return Ok(()),
                    None => warn!(line = %line.trim(), "unrecognized command"),
                }
            }
            filter = debouncer.settled() => {
                debug!(?filter, "queue filters settled");
                dash.load_page(transport, 0).await;
                render(dash);
            }
        }
    }

    if debouncer.is_pending() {
        let filter = debouncer.settled().await;
        debug!(?filter, "queue filters settled");
        dash.load_page(transport, 0).await;
        render(dash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{queue_of, ScriptedTransport};
    use crate::api::Endpoint;
    use crate::config::ApiConfig;
    use crate::filters::FilterState;

    fn dashboard() -> Dashboard {
        Dashboard::new(ApiConfig::default(), FilterState::default())
    }

    fn sent(transport: &ScriptedTransport, key: &str) -> Vec<String> {
        let calls = transport.calls.lock().unwrap();
        calls
            .iter()
            .filter(|(path, _)| path == "/queue")
            .filter_map(|(_, query)| {
                query
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_command(" risco_min = 40 "),
            Some(SessionCommand::Set {
                key: "risco_min".to_string(),
                value: "40".to_string()
            })
        );
        assert_eq!(parse_command("next"), Some(SessionCommand::Next));
        assert_eq!(parse_command("q"), Some(SessionCommand::Quit));
        assert_eq!(parse_command("dance"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_fetch_once_with_last_value() {
        let transport = ScriptedTransport::new().with_queue(queue_of(80));
        let mut dash = dashboard();
        let input: &[u8] = b"risco_min=10\nrisco_min=20\nrisco_min=30\nmrr_min=500\n";
        let mut renders = 0;

        run(&mut dash, &transport, input, |_| renders += 1).await.unwrap();

        assert_eq!(transport.call_count(Endpoint::Queue), 1);
        assert_eq!(sent(&transport, "risco_min"), vec!["30".to_string()]);
        assert_eq!(sent(&transport, "mrr_min"), vec!["500".to_string()]);
        assert_eq!(sent(&transport, "offset"), vec!["0".to_string()]);
        assert_eq!(renders, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_bypasses_and_cancels_debounce() {
        let transport = ScriptedTransport::healthy().with_queue(queue_of(80));
        let mut dash = dashboard();
        let input: &[u8] = b"uf=SP\nrefresh\nquit\n";

        run(&mut dash, &transport, input, |_| {}).await.unwrap();

        assert_eq!(sent(&transport, "uf"), vec!["SP".to_string()]);
        assert_eq!(sent(&transport, "limit"), vec!["100".to_string()]);
        assert_eq!(dash.customers.len(), 80);
        assert_eq!(dash.datasets.renewal.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn view_edits_do_not_refetch() {
        let transport = ScriptedTransport::new().with_queue(queue_of(80));
        let mut dash = dashboard();
        let input: &[u8] = b"category=Varejo\nwindow=31\xE2\x80\x9360\nnext\n";

        run(&mut dash, &transport, input, |_| {}).await.unwrap();

        assert_eq!(transport.call_count(Endpoint::Queue), 0);
        assert_eq!(dash.filters.category.as_deref(), Some("Varejo"));
        assert_eq!(dash.filters.window, "31–60");
    }
}
