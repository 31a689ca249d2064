use anyhow::{Context, Result, bail};
use tokio::{
    io::{self, AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    protocol::{EXIT_SENTINEL, read_line, strip_delimiter, write_line},
};

const RECEIVED_PREFIX: &str = "Received: ";

pub async fn run(args: ClientArgs) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());

    let server = match args.server {
        Some(server) => server,
        None => prompt(&mut stdin, "Enter server address: ").await?,
    };
    let (mut reader, mut writer) = establish_connection(&server, args.port).await?;

    let name = match args.name {
        Some(name) => name,
        None => prompt(&mut stdin, "Enter your name: ").await?,
    };
    write_line(&mut writer, &name)
        .await
        .context("failed to send name")?;

    run_client_loop(&mut reader, &mut writer, &mut stdin).await?;
    shutdown_connection(&mut writer).await;

    Ok(())
}

async fn prompt<R>(stdin: &mut R, label: &str) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    let mut buffer = Vec::new();
    match read_line(stdin, &mut buffer).await? {
        Some(line) => Ok(input_text(&line)),
        None => bail!("stdin closed before answering '{}'", label.trim_end()),
    }
}

async fn establish_connection(
    server: &str,
    port: u16,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
    let stream = TcpStream::connect((server, port))
        .await
        .with_context(|| format!("failed to connect to {server}:{port}"))?;

    info!("connected to {server}:{port}");

    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader), writer))
}

async fn run_client_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    stdin: &mut BufReader<tokio::io::Stdin>,
) -> Result<()> {
    // Both buffers outlive each select! round so a half-read line is resumed, not lost.
    let mut incoming = Vec::new();
    let mut typed = Vec::new();

    loop {
        select! {
            server_line = read_line(reader, &mut incoming) => {
                if !handle_server_line(server_line).await? {
                    break;
                }
            }
            input = read_line(stdin, &mut typed) => {
                if !handle_stdin_line(input?, writer).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_server_line(line: io::Result<Option<Vec<u8>>>) -> Result<bool> {
    match line? {
        Some(line) => {
            write_stdout(&received_text(&line)).await?;
            Ok(true)
        }
        None => {
            write_stdout("*** server closed the connection").await?;
            Ok(false)
        }
    }
}

/// Sends one typed line. Returns `false` when the client should stop.
async fn handle_stdin_line<W>(line: Option<Vec<u8>>, writer: &mut W) -> Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let Some(line) = line else {
        return Ok(false);
    };

    let text = input_text(&line);
    if text == EXIT_SENTINEL {
        return Ok(false);
    }

    write_line(writer, &text)
        .await
        .context("failed to send chat line")?;
    Ok(true)
}

fn received_text(line: &[u8]) -> String {
    format!(
        "{RECEIVED_PREFIX}{}",
        String::from_utf8_lossy(strip_delimiter(line))
    )
}

fn input_text(line: &[u8]) -> String {
    String::from_utf8_lossy(strip_delimiter(line))
        .trim_end_matches('\r')
        .to_string()
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown client writer cleanly");
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
