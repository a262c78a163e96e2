#![cfg(unix)]

use std::convert::Infallible;
use std::process::Stdio;
use std::time::Duration;

use axum::Router;
use axum::response::sse::{Event, Sse};
use axum::routing::post;
use futures_util::stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdout, Command};

async fn serve_pong() -> String {
    let app = Router::new().route(
        "/ai/chat/stream-sse",
        post(|| async {
            let frames = [
                r#"{"type":"start"}"#,
                r#"{"type":"chunk","content":"pong"}"#,
                r#"{"type":"end"}"#,
            ];
            Sse::new(stream::iter(
                frames.map(|data| Ok::<_, Infallible>(Event::default().data(data))),
            ))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Reads stdout until `done` holds for everything printed so far.
async fn read_until(stdout: &mut ChildStdout, done: impl Fn(&str) -> bool) -> String {
    let mut printed = Vec::new();
    let mut buf = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done(&String::from_utf8_lossy(&printed)) {
            let n = stdout.read(&mut buf).await.unwrap();
            assert!(n > 0, "chat-relay exited early");
            printed.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("chat-relay did not print the expected output in time");
    String::from_utf8_lossy(&printed).into_owned()
}

#[tokio::test]
async fn ctrl_c_at_the_prompt_exits_after_an_answer() {
    let url = serve_pong().await;
    let mut child = Command::new(env!("CARGO_BIN_EXE_chat-relay"))
        .args(["--url", &url])
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = child.stdout.take().unwrap();

    stdin.write_all(b"ping\n").await.unwrap();
    stdin.flush().await.unwrap();
    let printed = read_until(&mut stdout, |out| {
        out.split_once("pong").is_some_and(|(_, rest)| rest.contains("> "))
    })
    .await;
    assert!(printed.contains("pong"));

    // let the prompt start waiting for input
    tokio::time::sleep(Duration::from_millis(300)).await;
    let pid = child.id().unwrap().to_string();
    let killed = Command::new("kill").args(["-INT", &pid]).status().await.unwrap();
    assert!(killed.success());

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("chat-relay kept running after Ctrl-C at the prompt")
        .unwrap();
    assert_eq!(status.code(), Some(130));
    drop(stdin);
}
