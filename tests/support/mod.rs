//! Test doubles shared by the integration suites.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use yieldscan_core::{
    CapabilitySet, DataSource, DividendEntry, DividendHistory, FetchError, HttpClient, HttpError,
    HttpRequest, HttpResponse, ProviderId, Quote, SourceFuture, Symbol, Universe, UtcDateTime,
};

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

pub fn symbols(raw: &[&str]) -> Vec<Symbol> {
    raw.iter().map(|value| symbol(value)).collect()
}

type Scripted = Result<HttpResponse, HttpError>;

struct Route {
    needle: String,
    responses: VecDeque<Scripted>,
}

/// Transport answering by URL substring. The last scripted response for a
/// route repeats once earlier ones are consumed.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, response: HttpResponse) -> Self {
        self.script(needle, Ok(response))
    }

    pub fn fail(self, needle: &str, error: HttpError) -> Self {
        self.script(needle, Err(error))
    }

    fn script(self, needle: &str, response: Scripted) -> Self {
        {
            let mut routes = self.routes.lock().expect("routes lock");
            match routes.iter_mut().find(|route| route.needle == needle) {
                Some(route) => route.responses.push_back(response),
                None => routes.push(Route {
                    needle: needle.to_owned(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }

    fn respond(&self, url: &str) -> Scripted {
        self.requests.lock().expect("requests lock").push(url.to_owned());

        let mut routes = self.routes.lock().expect("routes lock");
        let Some(route) = routes.iter_mut().find(|route| url.contains(&route.needle)) else {
            return Ok(HttpResponse::new(404, format!("no script for {url}")));
        };
        if route.responses.len() > 1 {
            route
                .responses
                .pop_front()
                .expect("non-empty script")
        } else {
            route.responses.front().cloned().expect("non-empty script")
        }
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move { self.respond(&request.url) })
    }
}

/// Source client that counts concurrency and completions.
pub struct InstrumentedSource {
    id: ProviderId,
    delay: Duration,
    price: Decimal,
    prices: BTreeMap<Symbol, Decimal>,
    universe: Option<Vec<Symbol>>,
    failures: Mutex<BTreeMap<Symbol, VecDeque<FetchError>>>,
    dividends: BTreeMap<Symbol, Vec<DividendEntry>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl InstrumentedSource {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            delay: Duration::ZERO,
            price: Decimal::ONE_HUNDRED,
            prices: BTreeMap::new(),
            universe: None,
            failures: Mutex::new(BTreeMap::new()),
            dividends: BTreeMap::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    pub fn with_symbol_price(mut self, symbol: Symbol, price: Decimal) -> Self {
        self.prices.insert(symbol, price);
        self
    }

    pub fn with_universe(mut self, symbols: Vec<Symbol>) -> Self {
        self.universe = Some(symbols);
        self
    }

    /// Queues failures returned, in order, before the symbol succeeds.
    pub fn failing(self, symbol: Symbol, errors: Vec<FetchError>) -> Self {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(symbol, errors.into());
        self
    }

    pub fn with_dividends(mut self, symbol: Symbol, entries: Vec<DividendEntry>) -> Self {
        self.dividends.insert(symbol, entries);
        self
    }

    pub fn max_observed_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn instrumented<T>(
        &self,
        symbol: &Symbol,
        produce: impl FnOnce() -> T,
    ) -> Result<T, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard::enter(&self.in_flight);
        self.max_in_flight.fetch_max(guard.current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failure = self
            .failures
            .lock()
            .expect("failures lock")
            .get_mut(symbol)
            .and_then(VecDeque::pop_front);
        drop(guard);
        self.completed.fetch_add(1, Ordering::SeqCst);

        match failure {
            Some(error) => Err(error),
            None => Ok(produce()),
        }
    }
}

/// Decrements the in-flight counter even when the task is aborted mid-sleep.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
    current: usize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter, current }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DataSource for InstrumentedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(self.universe.is_some(), true, !self.dividends.is_empty())
    }

    fn universe(&self) -> SourceFuture<'_, Universe> {
        Box::pin(async move {
            match &self.universe {
                Some(symbols) => Ok(Universe::new(symbols.iter().cloned())),
                None => Err(FetchError::transient("universe offline")),
            }
        })
    }

    fn quote(&self, symbol: Symbol) -> SourceFuture<'_, Quote> {
        Box::pin(async move {
            let price = self.prices.get(&symbol).copied().unwrap_or(self.price);
            let id = self.id;
            let fetched_for = symbol.clone();
            self.instrumented(&symbol, move || {
                Quote::new(fetched_for, price, id, UtcDateTime::now()).expect("valid quote")
            })
            .await
        })
    }

    fn dividends(&self, symbol: Symbol) -> SourceFuture<'_, DividendHistory> {
        Box::pin(async move {
            let entries = self.dividends.get(&symbol).cloned().unwrap_or_default();
            let id = self.id;
            let fetched_for = symbol.clone();
            self.instrumented(&symbol, move || DividendHistory {
                symbol: fetched_for,
                source: id,
                fetched_at: UtcDateTime::now(),
                entries,
            })
            .await
        })
    }
}

/// One dividend entry per year, paid in June.
pub fn yearly_dividends(years: std::ops::RangeInclusive<i32>, amount: Decimal) -> Vec<DividendEntry> {
    years
        .map(|year| {
            let date = time::Date::from_calendar_date(year, time::Month::June, 15).expect("valid date");
            DividendEntry::new(date, amount).expect("valid entry")
        })
        .collect()
}

pub fn shared<T: DataSource + 'static>(source: T) -> (Arc<T>, Arc<dyn DataSource>) {
    let concrete = Arc::new(source);
    let dynamic: Arc<dyn DataSource> = concrete.clone();
    (concrete, dynamic)
}
