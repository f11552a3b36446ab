//! Event loop
//!
//! Reads commands from stdin and prints room events, status changes and
//! typing notices to stdout. Uses `tokio::select!` over the input lines and
//! the session's two streams.

use std::io;

use parley_client::{
    Credential, Endpoint, RoomEvent, RoomId, RoomService, RoomSession, ServiceError, SessionError,
    SessionStreams, UserId, http::HttpRoomService, ws::WsConnector,
};
use parley_core::{ConnectionError, Timeline, TypingIndicator};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    time::Instant,
};

use crate::{
    Args,
    command::{Command, HELP},
    render,
};

/// Client errors that end the program.
#[derive(Debug, Error)]
pub enum CliError {
    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// REST call failed.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Session could not start.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Bad socket base URL.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Line writer over stdout.
struct Output {
    stdout: Stdout,
}

impl Output {
    async fn line(&mut self, text: &str) -> io::Result<()> {
        self.stdout.write_all(text.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await
    }
}

/// Run the client until `/quit` or end of input.
///
/// Without a room the visible rooms are listed and the function returns.
pub async fn run(args: Args) -> Result<(), CliError> {
    let mut out = Output { stdout: tokio::io::stdout() };
    let service = HttpRoomService::new(&args.api)?;
    let credential = Credential::new(args.token.clone());

    let Some(room) = args.room.clone() else {
        list_rooms(&service, &credential, &mut out).await?;
        return Ok(());
    };

    let endpoint = Endpoint::parse(&args.server)?;
    let (session, streams) = RoomSession::open(
        RoomId::from(room),
        UserId::from(args.user.as_str()),
        credential.clone(),
        endpoint,
        args.connection_config(),
        WsConnector::new(args.connector_config()),
        service.clone(),
    );

    tracing::info!(room = %session.room_id(), server = %args.server, "joining room");
    session.connect()?;

    let mut chat = Chat {
        session,
        service,
        credential,
        local_user: UserId::from(args.user.as_str()),
        timeline: Timeline::new(UserId::from(args.user.as_str())),
        typing: TypingIndicator::default(),
        out,
    };
    chat.run(streams).await
}

async fn list_rooms(
    service: &HttpRoomService,
    credential: &Credential,
    out: &mut Output,
) -> Result<(), CliError> {
    let rooms = service.list_rooms(credential).await?;
    if rooms.is_empty() {
        out.line("no rooms").await?;
    }
    for room in &rooms {
        out.line(&render::room(room)).await?;
    }
    Ok(())
}

struct Chat {
    session: RoomSession<WsConnector, HttpRoomService>,
    service: HttpRoomService,
    credential: Credential,
    local_user: UserId,
    timeline: Timeline,
    typing: TypingIndicator<Instant>,
    out: Output,
}

impl Chat {
    async fn run(&mut self, mut streams: SessionStreams) -> Result<(), CliError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let should_quit = tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await?,
                    None => true,
                },

                Some(event) = streams.events.recv() => {
                    self.handle_event(event).await?;
                    false
                }

                Some(state) = streams.status.recv() => {
                    self.out.line(&render::status(state)).await?;
                    false
                }
            };

            if should_quit {
                break;
            }
        }

        self.session.disconnect();
        Ok(())
    }

    /// Handle one input line. Returns true to quit.
    async fn handle_line(&mut self, line: &str) -> Result<bool, CliError> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(error) => {
                self.out.line(&format!("!! {error}")).await?;
                return Ok(false);
            },
        };

        match command {
            Command::Say(text) => self.say(text).await?,
            Command::Typing => {
                if !self.session.send_typing() {
                    self.out.line("!! not connected").await?;
                }
            },
            Command::Token(token) => {
                self.credential = Credential::new(token);
                self.session.update_credential(self.credential.clone());
            },
            Command::Connect => {
                if let Err(error) = self.session.connect() {
                    self.out.line(&format!("!! {error}")).await?;
                }
            },
            Command::Rooms => {
                if let Err(error) = list_rooms(&self.service, &self.credential, &mut self.out).await
                {
                    tracing::warn!(%error, "room listing failed");
                    self.out.line(&format!("!! {error}")).await?;
                }
            },
            Command::Help => self.out.line(HELP).await?,
            Command::Quit => return Ok(true),
            Command::Nothing => {},
        }
        Ok(false)
    }

    async fn say(&mut self, text: String) -> Result<(), CliError> {
        let id = self.timeline.push_pending(text.as_str());

        match self.session.send_message(&text) {
            Ok(()) => {
                if let Some(pending) = self.timeline.messages().iter().find(|m| m.id == id) {
                    let line = render::message(pending, &self.local_user);
                    self.out.line(&line).await?;
                }
            },
            Err(error) => {
                self.timeline.withdraw(&id);
                self.out.line(&format!("!! not sent: {error}")).await?;
            },
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: RoomEvent) -> Result<(), CliError> {
        match &event {
            RoomEvent::Typing { sender_id } => {
                let now = Instant::now();
                let already_shown = self.typing.is_active(now);
                self.typing.observe(sender_id.clone(), now);
                if !already_shown {
                    self.out.line(&render::typing(sender_id.as_ref())).await?;
                }
            },
            RoomEvent::Message(message) => {
                let own = message.sender_id == self.local_user;
                if self.timeline.apply(&event) && !own {
                    self.typing.clear();
                    self.out.line(&render::message(message, &self.local_user)).await?;
                }
            },
            RoomEvent::History(_) => {
                self.timeline.apply(&event);
                for message in self.timeline.messages() {
                    let line = render::message(message, &self.local_user);
                    self.out.line(&line).await?;
                }
            },
        }
        Ok(())
    }
}
