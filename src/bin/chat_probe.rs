// Joins a conversation room, sends one message through the gate, then echoes
// whatever the room broadcasts for a few seconds.
use spaceshare::client::models::conversation::{Conversation, SendGate};
use spaceshare::client::services::live_channel::LiveChannel;
use spaceshare::server::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let room = args.next().unwrap_or_else(|| "probe-room".to_string());
    let name = args.next().unwrap_or_else(|| "probe".to_string());
    let text = args.next().unwrap_or_else(|| "hello from chat_probe".to_string());

    let config = ClientConfig::from_env();
    let url = format!("ws://{}:{}", config.websocket_host, config.websocket_port);
    println!("Connecting to {} (room '{}')", url, room);

    let mut channel = LiveChannel::new(url, room.clone(), name);
    let mut receiver = channel.take_receiver().expect("receiver taken once");
    channel.connect().await?;

    let mut conversation = Conversation::new(&room);
    conversation.seed(channel.history().to_vec());
    println!("Seeded {} message(s) of history", conversation.merged().len());

    let mut gate = SendGate::new();
    gate.set_connected(channel.is_connected());
    gate.set_draft(&text);
    gate.handle_send(&mut channel);

    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(5);
    loop {
        match tokio::time::timeout_at(deadline, receiver.recv()).await {
            Ok(Some(message)) => {
                conversation.push_live(message);
                let merged = conversation.merged();
                let last = merged.last().expect("just pushed");
                println!("[{}] {}: {}", last.created_at, last.user.name, last.content);
            }
            Ok(None) => break,
            Err(_) => break, // deadline reached
        }
    }

    println!("Room '{}' has {} message(s)", room, conversation.merged().len());
    Ok(())
}
