//! Event-driven orchestration of location, lookups and rendering.
//!
//! Everything the controller reacts to arrives as an [`Event`] on a single
//! channel: location reports, city entries, unit toggles and the results of
//! the lookups it spawned. The controller owns the [`WeatherRecord`]; spawned
//! lookups only hand back an [`Observation`].

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    FetchError,
    location::{LocationEvent, LocationFix, LocationSession, LocationSource},
    model::{DisplayUnits, Observation, Query, WeatherRecord, WeatherView},
    prompt::CityPrompt,
    provider::WeatherProvider,
};

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Identifies one issued lookup. Later lookups have larger ids.
pub type RequestId = u64;

#[derive(Debug)]
pub enum Event {
    Location(LocationEvent),
    CityEntered(String),
    UnitsToggled { is_celsius: bool },
    Fetched {
        request: RequestId,
        result: Result<Observation, FetchError>,
    },
    Shutdown,
}

/// What handling one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing visible changed.
    Ignored,
    /// A lookup was started.
    Requested(RequestId),
    /// The view changed.
    Rendered,
    /// A lookup finished after a newer one was issued; its result was dropped.
    Stale(RequestId),
    Shutdown,
}

#[derive(Debug)]
pub struct WeatherController {
    provider: Arc<dyn WeatherProvider>,
    location: LocationSession,
    record: WeatherRecord,
    units: DisplayUnits,
    view: WeatherView,
    events: EventSender,
    next_request: RequestId,
    latest_request: Option<RequestId>,
}

impl WeatherController {
    pub const LOCATION_UNAVAILABLE: &'static str = "Location unavailable";
    pub const CONNECTION_ISSUES: &'static str = "Connection issues";

    /// Build a controller and the receiving end of its event channel.
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        location: Box<dyn LocationSource>,
        units: DisplayUnits,
    ) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let record = WeatherRecord::default();
        let view = WeatherView::render(&record, units);

        let controller = Self {
            provider,
            location: LocationSession::new(location),
            record,
            units,
            view,
            events,
            next_request: 1,
            latest_request: None,
        };

        (controller, rx)
    }

    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    /// A prompt whose confirmation posts [`Event::CityEntered`].
    pub fn city_prompt(&self) -> CityPrompt {
        Self::city_prompt_on(self.sender())
    }

    /// Same as [`Self::city_prompt`], for front ends that only kept a sender.
    pub fn city_prompt_on(events: EventSender) -> CityPrompt {
        CityPrompt::new(move |city| {
            let _ = events.send(Event::CityEntered(city));
        })
    }

    pub fn view(&self) -> &WeatherView {
        &self.view
    }

    pub fn record(&self) -> &WeatherRecord {
        &self.record
    }

    pub fn units(&self) -> DisplayUnits {
        self.units
    }

    /// Ask the location source for updates. Only the first call has effect.
    pub fn start_location(&mut self) {
        self.location.start(self.events.clone());
    }

    pub fn handle(&mut self, event: Event) -> Outcome {
        match event {
            Event::Location(LocationEvent::Updated(fixes)) => self.on_location_update(&fixes),
            Event::Location(LocationEvent::Failed(err)) => self.on_location_failed(&err),
            Event::CityEntered(name) => Outcome::Requested(self.on_city_entered(name)),
            Event::UnitsToggled { is_celsius } => self.on_unit_toggle(is_celsius),
            Event::Fetched { request, result } => self.on_fetched(request, result),
            Event::Shutdown => Outcome::Shutdown,
        }
    }

    /// Consume events until [`Event::Shutdown`], calling `on_render` after
    /// every view change.
    pub async fn run(mut self, mut events: EventReceiver, mut on_render: impl FnMut(&WeatherView)) {
        while let Some(event) = events.recv().await {
            match self.handle(event) {
                Outcome::Rendered => on_render(&self.view),
                Outcome::Shutdown => break,
                _ => {}
            }
        }
    }

    pub fn on_location_update(&mut self, fixes: &[LocationFix]) -> Outcome {
        match self.location.accept(fixes) {
            Some(fix) => Outcome::Requested(self.on_location_available(fix.lat, fix.lon)),
            None => Outcome::Ignored,
        }
    }

    /// Fetch by coordinates. Must be called from within a tokio runtime.
    pub fn on_location_available(&mut self, lat: f64, lon: f64) -> RequestId {
        info!(lat, lon, "location acquired");
        self.fetch(Query::Coordinates { lat, lon })
    }

    pub fn on_location_failed(&mut self, error: &str) -> Outcome {
        warn!(%error, "location unavailable");
        self.view.city = Self::LOCATION_UNAVAILABLE.to_string();
        Outcome::Rendered
    }

    /// Fetch by city name. Must be called from within a tokio runtime.
    pub fn on_city_entered(&mut self, name: String) -> RequestId {
        self.fetch(Query::City(name))
    }

    /// Start one lookup. Its result comes back as [`Event::Fetched`].
    ///
    /// The lookup is spawned with `tokio::spawn`, so this panics outside a
    /// tokio runtime. [`Self::handle`] calls it for city entries and
    /// accepted location fixes, so the same applies there.
    pub fn fetch(&mut self, query: Query) -> RequestId {
        let request = self.next_request;
        self.next_request += 1;
        self.latest_request = Some(request);

        debug!(request, ?query, "fetching weather");

        let provider = Arc::clone(&self.provider);
        let events = self.sender();
        tokio::spawn(async move {
            let result = provider.current(&query).await;
            let _ = events.send(Event::Fetched { request, result });
        });

        request
    }

    pub fn on_fetched(
        &mut self,
        request: RequestId,
        result: Result<Observation, FetchError>,
    ) -> Outcome {
        if self.latest_request != Some(request) {
            debug!(request, latest = ?self.latest_request, "dropping stale weather result");
            return Outcome::Stale(request);
        }

        match result {
            Ok(observation) => {
                self.record.apply(observation);
                self.view = self.render();
            }
            Err(err) => {
                error!(request, error = %err, "weather lookup failed");
                self.view.city = Self::CONNECTION_ISSUES.to_string();
            }
        }

        Outcome::Rendered
    }

    pub fn render(&self) -> WeatherView {
        WeatherView::render(&self.record, self.units)
    }

    pub fn on_unit_toggle(&mut self, is_celsius: bool) -> Outcome {
        self.units = DisplayUnits::from_celsius_flag(is_celsius);
        self.view = self.render();
        Outcome::Rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FixedLocation, tests::CountingSource};
    use async_trait::async_trait;
    use std::sync::{Mutex, atomic::Ordering};

    /// Answers every query with the same observation and remembers what it
    /// was asked.
    #[derive(Debug, Default)]
    struct CannedProvider {
        answer: Option<Observation>,
        queries: Mutex<Vec<Query>>,
    }

    impl CannedProvider {
        fn answering(observation: Observation) -> Arc<Self> {
            Arc::new(Self {
                answer: Some(observation),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn queries(&self) -> Vec<Query> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherProvider for CannedProvider {
        async fn current(&self, query: &Query) -> Result<Observation, FetchError> {
            self.queries.lock().unwrap().push(query.clone());
            match &self.answer {
                Some(obs) => Ok(obs.clone()),
                None => Err(FetchError::Decode(
                    serde_json::from_str::<serde_json::Value>("not json").unwrap_err(),
                )),
            }
        }
    }

    fn paris() -> Observation {
        Observation {
            name: "Paris".into(),
            temperature: Some(290.0),
            condition: Some(800),
        }
    }

    fn controller(provider: Arc<CannedProvider>) -> (WeatherController, EventReceiver) {
        WeatherController::new(provider, Box::new(FixedLocation::default()), DisplayUnits::Celsius)
    }

    /// Handle events until one changes the view.
    async fn settle(controller: &mut WeatherController, rx: &mut EventReceiver) -> Outcome {
        while let Some(event) = rx.recv().await {
            let outcome = controller.handle(event);
            if matches!(outcome, Outcome::Rendered) {
                return outcome;
            }
        }
        Outcome::Ignored
    }

    #[tokio::test]
    async fn city_entry_renders_result() {
        let provider = CannedProvider::answering(paris());
        let (mut ctl, mut rx) = controller(Arc::clone(&provider));

        ctl.city_prompt().confirm("Paris".into());
        assert_eq!(settle(&mut ctl, &mut rx).await, Outcome::Rendered);

        let view = ctl.view();
        assert_eq!(view.city, "Paris");
        assert_eq!(view.temperature, "17°");
        assert_eq!(view.icon, Some("sunny"));
        assert_eq!(provider.queries(), vec![Query::City("Paris".into())]);
    }

    #[tokio::test]
    async fn failed_lookup_shows_connection_issues() {
        let (mut ctl, mut rx) = controller(CannedProvider::failing());

        ctl.on_city_entered("Paris".into());
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.view().city, WeatherController::CONNECTION_ISSUES);
        assert_eq!(ctl.record(), &WeatherRecord::default());
    }

    #[tokio::test]
    async fn missing_temperature_shows_city_not_found() {
        let provider = CannedProvider::answering(Observation {
            name: "Paris".into(),
            temperature: None,
            condition: None,
        });
        let (mut ctl, mut rx) = controller(provider);

        ctl.on_city_entered("Paris".into());
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.view().city, WeatherRecord::CITY_NOT_FOUND);
        assert_eq!(ctl.view().icon, None);
    }

    #[tokio::test]
    async fn unit_toggle_rerenders_without_fetching() {
        let provider = CannedProvider::answering(paris());
        let (mut ctl, mut rx) = controller(Arc::clone(&provider));

        ctl.on_city_entered("Paris".into());
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.handle(Event::UnitsToggled { is_celsius: false }), Outcome::Rendered);
        assert_eq!(ctl.view().temperature, "62°");
        assert_eq!(ctl.record().temperature, 290.0);

        ctl.on_unit_toggle(true);
        assert_eq!(ctl.view().temperature, "17°");

        assert_eq!(provider.queries().len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_result_is_dropped() {
        let (mut ctl, _rx) = controller(CannedProvider::answering(paris()));

        let first = ctl.on_city_entered("Paris".into());
        let second = ctl.on_city_entered("Oslo".into());
        assert!(second > first);

        let outcome = ctl.on_fetched(first, Ok(paris()));
        assert_eq!(outcome, Outcome::Stale(first));
        assert_eq!(ctl.record(), &WeatherRecord::default());

        let oslo = Observation {
            name: "Oslo".into(),
            temperature: Some(268.15),
            condition: Some(601),
        };
        assert_eq!(ctl.on_fetched(second, Ok(oslo)), Outcome::Rendered);
        assert_eq!(ctl.view().city, "Oslo");
        assert_eq!(ctl.view().temperature, "-5°");
        assert_eq!(ctl.view().icon, Some("snow4"));
    }

    #[tokio::test]
    async fn location_fix_fetches_by_coordinates_once() {
        let provider = CannedProvider::answering(paris());
        let source = CountingSource::default();
        let (mut ctl, mut rx) = WeatherController::new(
            Arc::clone(&provider) as Arc<dyn WeatherProvider>,
            Box::new(source.clone()),
            DisplayUnits::Celsius,
        );
        ctl.start_location();

        let fix = |accuracy| LocationFix {
            lat: 48.85,
            lon: 2.35,
            horizontal_accuracy: accuracy,
        };

        assert_eq!(ctl.on_location_update(&[fix(0.0)]), Outcome::Ignored);
        assert_eq!(source.stops.load(Ordering::SeqCst), 0);

        assert!(matches!(ctl.on_location_update(&[fix(100.0)]), Outcome::Requested(_)));
        assert_eq!(ctl.on_location_update(&[fix(30.0)]), Outcome::Ignored);
        assert_eq!(source.stops.load(Ordering::SeqCst), 1);

        settle(&mut ctl, &mut rx).await;
        assert_eq!(provider.queries(), vec![Query::Coordinates { lat: 48.85, lon: 2.35 }]);
    }

    #[tokio::test]
    async fn location_failure_sets_label_only() {
        let provider = CannedProvider::answering(paris());
        let (mut ctl, mut rx) = controller(Arc::clone(&provider));

        ctl.start_location();
        assert_eq!(settle(&mut ctl, &mut rx).await, Outcome::Rendered);

        assert_eq!(ctl.view().city, WeatherController::LOCATION_UNAVAILABLE);
        assert!(provider.queries().is_empty());
    }

    #[test]
    #[should_panic]
    fn fetch_requires_a_runtime() {
        let (mut ctl, _rx) = controller(CannedProvider::answering(paris()));
        ctl.on_city_entered("Paris".into());
    }

    #[tokio::test]
    async fn inaccurate_fixed_location_ends_as_unavailable() {
        let provider = CannedProvider::answering(paris());
        let fix = LocationFix {
            lat: 1.0,
            lon: 2.0,
            horizontal_accuracy: 0.0,
        };
        let (mut ctl, mut rx) = WeatherController::new(
            Arc::clone(&provider) as Arc<dyn WeatherProvider>,
            Box::new(FixedLocation::new(Some(fix))),
            DisplayUnits::Celsius,
        );
        ctl.start_location();

        let first = rx.recv().await.unwrap();
        assert_eq!(ctl.handle(first), Outcome::Ignored);
        assert_eq!(settle(&mut ctl, &mut rx).await, Outcome::Rendered);

        assert_eq!(ctl.view().city, WeatherController::LOCATION_UNAVAILABLE);
        assert!(provider.queries().is_empty());
    }

    #[tokio::test]
    async fn run_reports_renders_until_shutdown() {
        let (ctl, rx) = controller(CannedProvider::answering(paris()));
        let tx = ctl.sender();

        tx.send(Event::UnitsToggled { is_celsius: false }).unwrap();
        tx.send(Event::Location(LocationEvent::Failed("denied".into()))).unwrap();
        tx.send(Event::Shutdown).unwrap();

        let mut seen = Vec::new();
        ctl.run(rx, |view| seen.push(view.clone())).await;

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].city, WeatherController::LOCATION_UNAVAILABLE);
    }
}
