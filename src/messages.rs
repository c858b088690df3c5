use crate::error::TrackerError;
use crate::poller::TrackerEvent;

#[derive(Debug, Clone)]
pub enum Message {
    AddressInputChanged(String),
    Track,
    TrackFinished(Result<(), TrackerError>),
    Clear,
    /// `None` once the tracker's channel has closed.
    Tracker(Option<TrackerEvent>),
    DismissError,
    CloseRequested,
    ShutdownComplete,
}
