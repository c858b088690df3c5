use std::sync::Arc;

use iced::widget::{Button, Column, Container, Row, Scrollable, Text, TextInput};
use iced::{
    alignment, subscription, window, Alignment, Application, Color, Command, Element, Event,
    Length, Subscription, Theme,
};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info};

use crate::executor::TokioExecutor;
use crate::messages::Message;
use crate::poller::{LoopStatus, Tracker, TrackerEvent};
use crate::utils::{format_eth, format_timestamp, format_usd};
use crate::wallet::WalletSnapshot;

type EventStream = Arc<AsyncMutex<mpsc::UnboundedReceiver<TrackerEvent>>>;

pub struct Flags {
    pub tracker: Arc<Tracker>,
    pub events: mpsc::UnboundedReceiver<TrackerEvent>,
}

async fn next_event(events: EventStream) -> Option<TrackerEvent> {
    events.lock().await.recv().await
}

/// The foreground: the only place tracker results are rendered.
pub struct WalletTrackerApp {
    tracker: Arc<Tracker>,
    events: EventStream,
    address_input: String,
    snapshot: Option<WalletSnapshot>,
    error: Option<String>,
    loading: bool,
    shutting_down: bool,
}

impl WalletTrackerApp {
    /// Wait for the next tracker event and feed it back through `update`.
    fn listen(&self) -> Command<Message> {
        Command::perform(next_event(self.events.clone()), Message::Tracker)
    }

    fn apply(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Snapshot(snapshot) => {
                debug!(
                    address = %snapshot.address,
                    transactions = snapshot.transactions.len(),
                    "rendering snapshot"
                );
                self.snapshot = Some(snapshot);
            }
            TrackerEvent::Failed(err) => {
                self.error = Some(err.to_string());
            }
        }
    }

    fn wallet_info(&self) -> Element<Message> {
        let (balance, price, value) = match &self.snapshot {
            Some(snapshot) => (
                format_eth(snapshot.balance_eth),
                format_usd(snapshot.price_usd),
                format_usd(snapshot.value_usd),
            ),
            None => ("0".to_string(), "$0".to_string(), "$0".to_string()),
        };

        let mut info = Column::new()
            .push(Text::new("Wallet").size(18))
            .push(Text::new(format!("ETH Balance: {balance}")))
            .push(Text::new(format!("ETH Price: {price}")))
            .push(Text::new(format!("Total Value: {value}")).style(Color::from_rgb(0.0, 0.5, 0.0)))
            .spacing(5)
            .padding(5);

        let refresh = match self.tracker.status() {
            LoopStatus::Running => "Auto-refresh: on",
            LoopStatus::Idle | LoopStatus::Stopped => "Auto-refresh: off",
        };
        info = info.push(Text::new(refresh).size(12));

        if let Some(snapshot) = &self.snapshot {
            info = info.push(
                Text::new(format!(
                    "{} (updated {})",
                    snapshot.address,
                    format_timestamp(snapshot.fetched_at)
                ))
                .size(12),
            );
        }

        info.into()
    }

    fn transaction_table(&self) -> Element<Message> {
        let header = Row::new()
            .push(Text::new("Date").size(14).width(Length::FillPortion(3)))
            .push(Text::new("Type").size(14).width(Length::FillPortion(2)))
            .push(Text::new("Amount (ETH)").size(14).width(Length::FillPortion(2)))
            .push(Text::new("Status").size(14).width(Length::FillPortion(2)))
            .spacing(10)
            .padding(5);

        let transactions = self
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.transactions.as_slice())
            .unwrap_or_default();

        let rows = transactions.iter().fold(
            Column::new().push(header).spacing(2),
            |col, tx| {
                col.push(
                    Row::new()
                        .push(
                            Text::new(format_timestamp(tx.timestamp))
                                .size(12)
                                .width(Length::FillPortion(3)),
                        )
                        .push(
                            Text::new(tx.direction.label())
                                .size(12)
                                .width(Length::FillPortion(2)),
                        )
                        .push(
                            Text::new(format_eth(tx.amount_eth))
                                .size(12)
                                .width(Length::FillPortion(2)),
                        )
                        .push(
                            Text::new(tx.status.label())
                                .size(12)
                                .width(Length::FillPortion(2)),
                        )
                        .spacing(10)
                        .padding(5),
                )
            },
        );

        let rows = if transactions.is_empty() && self.snapshot.is_some() {
            rows.push(Text::new("No transactions").size(12))
        } else {
            rows
        };

        Column::new()
            .push(Text::new("Transaction History").size(18))
            .push(
                Scrollable::new(rows)
                    .height(Length::Fill)
                    .width(Length::Fill),
            )
            .spacing(5)
            .into()
    }
}

impl Application for WalletTrackerApp {
    type Message = Message;
    type Executor = TokioExecutor;
    type Flags = Flags;
    type Theme = Theme;

    fn new(flags: Flags) -> (Self, Command<Message>) {
        let app = Self {
            tracker: flags.tracker,
            events: Arc::new(AsyncMutex::new(flags.events)),
            address_input: String::new(),
            snapshot: None,
            error: None,
            loading: false,
            shutting_down: false,
        };
        let listen = app.listen();
        (app, listen)
    }

    fn title(&self) -> String {
        String::from("ETH Wallet Tracker")
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::AddressInputChanged(value) => {
                self.address_input = value;
                Command::none()
            }
            Message::Track => {
                if self.loading || self.shutting_down {
                    return Command::none();
                }
                self.loading = true;
                self.error = None;
                let tracker = self.tracker.clone();
                let address = self.address_input.clone();
                Command::perform(
                    async move { tracker.start(&address).await },
                    Message::TrackFinished,
                )
            }
            Message::TrackFinished(result) => {
                self.loading = false;
                match result {
                    Ok(()) => {
                        let tracked = self.tracker.tracked_address();
                        if self.snapshot.as_ref().map(|s| &s.address) != tracked.as_ref() {
                            self.snapshot = None;
                        }
                    }
                    Err(err) => self.error = Some(err.to_string()),
                }
                Command::none()
            }
            Message::Clear => {
                self.tracker.clear();
                self.snapshot = None;
                self.error = None;
                Command::none()
            }
            Message::Tracker(Some(event)) => {
                if self.shutting_down {
                    return Command::none();
                }
                self.apply(event);
                self.listen()
            }
            Message::Tracker(None) => {
                debug!("tracker event channel closed");
                Command::none()
            }
            Message::DismissError => {
                self.error = None;
                Command::none()
            }
            Message::CloseRequested => {
                if self.shutting_down {
                    return Command::none();
                }
                info!("window close requested, stopping tracker");
                self.shutting_down = true;
                let tracker = self.tracker.clone();
                Command::perform(
                    async move { tracker.stop().await },
                    |()| Message::ShutdownComplete,
                )
            }
            Message::ShutdownComplete => window::close(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        subscription::events_with(|event, _status| match event {
            Event::Window(.., window::Event::CloseRequested) => Some(Message::CloseRequested),
            _ => None,
        })
    }

    fn view(&self) -> Element<Message> {
        let input = TextInput::new("Wallet address (0x...)", &self.address_input)
            .on_input(Message::AddressInputChanged)
            .on_submit(Message::Track)
            .padding(10)
            .size(16)
            .width(Length::Fill);

        let mut track_button = Button::new(Text::new("Track")).padding(10);
        if !self.loading && !self.shutting_down {
            track_button = track_button.on_press(Message::Track);
        }

        let clear_button = Button::new(Text::new("Clear"))
            .on_press(Message::Clear)
            .padding(10);

        let address_row = Row::new()
            .push(input)
            .push(track_button)
            .push(clear_button)
            .spacing(10)
            .align_items(Alignment::Center);

        let mut content = Column::new()
            .push(address_row)
            .spacing(15)
            .padding(20)
            .width(Length::Fill);

        if self.loading {
            content = content.push(Text::new("Fetching wallet data..."));
        }

        if let Some(error) = &self.error {
            content = content.push(
                Row::new()
                    .push(
                        Text::new(error)
                            .size(14)
                            .style(Color::from_rgb(0.8, 0.0, 0.0))
                            .width(Length::Fill)
                            .horizontal_alignment(alignment::Horizontal::Left),
                    )
                    .push(
                        Button::new(Text::new("Dismiss"))
                            .on_press(Message::DismissError)
                            .padding(5),
                    )
                    .spacing(10)
                    .align_items(Alignment::Center),
            );
        }

        content = content
            .push(self.wallet_info())
            .push(self.transaction_table());

        Container::new(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .padding(10)
            .into()
    }
}
