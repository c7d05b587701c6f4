//! SQLite store for step catalogs and run results.
//!
//! Each travel mode keeps its catalog in its own table; run results land in
//! one shared table with scalar summary columns beside JSON text columns for
//! parameters and per-step results.

use crate::error::{ServeError, ServeResult};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use viajar::{Mode, RunOutcome, RunResult, StepDefinition};

/// Store wrapper shared by the HTTP handlers
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

/// Catalog listing entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    /// Test case identifier
    pub test_case_id: String,
    /// Number of steps in the case
    pub step_count: u32,
}

const fn catalog_table(mode: Mode) -> &'static str {
    match mode {
        Mode::Flight => "flight_test_cases",
        Mode::Bus => "bus_test_cases",
        Mode::Train => "train_test_cases",
        Mode::Hotel => "hotel_test_cases",
    }
}

fn outcome_from_column(text: &str) -> RunOutcome {
    match text {
        "PASSED" => RunOutcome::Passed,
        "FAILED" => RunOutcome::Failed,
        _ => RunOutcome::Error,
    }
}

impl Store {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> ServeResult<Self> {
        let conn = Connection::open(path.as_ref())?;

        // WAL for concurrent handler access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!("Opened store at {:?}", path.as_ref());
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> ServeResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> ServeResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r"
            -- One catalog table per travel mode
            CREATE TABLE IF NOT EXISTS flight_test_cases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_case_id TEXT NOT NULL,
                element_name TEXT NOT NULL,
                xpath TEXT NOT NULL,
                action_type TEXT NOT NULL,
                expected_result TEXT NOT NULL DEFAULT '',
                step_order INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_flight_case ON flight_test_cases(test_case_id);

            CREATE TABLE IF NOT EXISTS bus_test_cases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_case_id TEXT NOT NULL,
                element_name TEXT NOT NULL,
                xpath TEXT NOT NULL,
                action_type TEXT NOT NULL,
                expected_result TEXT NOT NULL DEFAULT '',
                step_order INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bus_case ON bus_test_cases(test_case_id);

            CREATE TABLE IF NOT EXISTS train_test_cases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_case_id TEXT NOT NULL,
                element_name TEXT NOT NULL,
                xpath TEXT NOT NULL,
                action_type TEXT NOT NULL,
                expected_result TEXT NOT NULL DEFAULT '',
                step_order INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_train_case ON train_test_cases(test_case_id);

            CREATE TABLE IF NOT EXISTS hotel_test_cases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_case_id TEXT NOT NULL,
                element_name TEXT NOT NULL,
                xpath TEXT NOT NULL,
                action_type TEXT NOT NULL,
                expected_result TEXT NOT NULL DEFAULT '',
                step_order INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_hotel_case ON hotel_test_cases(test_case_id);

            -- Run results, one row per executed run
            CREATE TABLE IF NOT EXISTS test_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                test_case_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                outcome TEXT NOT NULL,
                total_steps INTEGER NOT NULL,
                passed_count INTEGER NOT NULL,
                failed_count INTEGER NOT NULL,
                execution_time_ms INTEGER NOT NULL,
                parameters TEXT NOT NULL DEFAULT '{}',
                step_results TEXT NOT NULL DEFAULT '[]',
                error TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_case ON test_results(test_case_id);
            ",
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    // ========================================================================
    // Step catalog
    // ========================================================================

    /// Insert one catalog row
    pub fn insert_step(
        &self,
        mode: Mode,
        test_case_id: &str,
        step: &StepDefinition,
    ) -> ServeResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} (test_case_id, element_name, xpath, action_type, expected_result, step_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                catalog_table(mode)
            ),
            params![
                test_case_id,
                step.element_name,
                step.locators.to_string(),
                step.action.to_string(),
                step.expected_result,
                step.order,
            ],
        )?;
        Ok(())
    }

    /// Load the ordered steps of one test case.
    ///
    /// Returns `None` when the catalog has no rows for the id, which the API
    /// maps to 404.
    pub fn load_steps(
        &self,
        test_case_id: &str,
        mode: Mode,
    ) -> ServeResult<Option<Vec<StepDefinition>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT element_name, xpath, action_type, expected_result, step_order
             FROM {} WHERE test_case_id = ?1 ORDER BY step_order ASC",
            catalog_table(mode)
        ))?;

        let rows = stmt.query_map(params![test_case_id], |row| {
            Ok(StepDefinition::new(
                row.get::<_, String>(0)?,
                &row.get::<_, String>(1)?,
                &row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;

        let mut steps = Vec::new();
        for row in rows {
            steps.push(row?);
        }

        if steps.is_empty() {
            Ok(None)
        } else {
            Ok(Some(steps))
        }
    }

    /// List the catalog of one mode with per-case step counts
    pub fn list_cases(&self, mode: Mode) -> ServeResult<Vec<CaseSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT test_case_id, COUNT(*) FROM {}
             GROUP BY test_case_id ORDER BY test_case_id ASC",
            catalog_table(mode)
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok(CaseSummary {
                test_case_id: row.get(0)?,
                step_count: row.get(1)?,
            })
        })?;

        let mut cases = Vec::new();
        for row in rows {
            cases.push(row?);
        }
        Ok(cases)
    }

    // ========================================================================
    // Run results
    // ========================================================================

    /// Persist a run result, returning the new row id
    pub fn save_result(&self, result: &RunResult) -> ServeResult<i64> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO test_results
             (run_id, test_case_id, mode, outcome, total_steps, passed_count,
              failed_count, execution_time_ms, parameters, step_results, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                result.run_id,
                result.test_case_id,
                result.mode.as_str(),
                result.outcome.to_string(),
                result.total_steps,
                result.passed_count,
                result.failed_count,
                result.execution_time_ms,
                serde_json::to_string(&result.parameters)?,
                serde_json::to_string(&result.step_results)?,
                result.error,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(result_id = id, run_id = %result.run_id, "Saved run result");
        Ok(id)
    }

    /// Load a stored run result by row id
    pub fn load_result(&self, id: i64) -> ServeResult<Option<RunResult>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT run_id, test_case_id, mode, outcome, total_steps, passed_count,
                        failed_count, execution_time_ms, parameters, step_results, error
                 FROM test_results WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RawResult {
                        run_id: row.get(0)?,
                        test_case_id: row.get(1)?,
                        mode: row.get(2)?,
                        outcome: row.get(3)?,
                        total_steps: row.get(4)?,
                        passed_count: row.get(5)?,
                        failed_count: row.get(6)?,
                        execution_time_ms: row.get(7)?,
                        parameters: row.get(8)?,
                        step_results: row.get(9)?,
                        error: row.get(10)?,
                    })
                },
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.parse()?)),
            None => Ok(None),
        }
    }

    /// Connectivity probe for the health endpoint
    pub fn ping(&self) -> ServeResult<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ========================================================================
    // Seed data
    // ========================================================================

    /// Load the demo catalogs, replacing any previous rows for the same case
    /// ids. Returns the number of inserted steps.
    pub fn seed_demo(&self) -> ServeResult<usize> {
        let mut inserted = 0;
        for (mode, test_case_id, steps) in demo_catalog() {
            {
                let conn = self.conn.lock();
                conn.execute(
                    &format!(
                        "DELETE FROM {} WHERE test_case_id = ?1",
                        catalog_table(mode)
                    ),
                    params![test_case_id],
                )?;
            }
            for step in &steps {
                self.insert_step(mode, test_case_id, step)?;
                inserted += 1;
            }
        }
        info!(steps = inserted, "Seeded demo catalogs");
        Ok(inserted)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// Raw result row before JSON parsing
struct RawResult {
    run_id: String,
    test_case_id: String,
    mode: String,
    outcome: String,
    total_steps: usize,
    passed_count: usize,
    failed_count: usize,
    execution_time_ms: u64,
    parameters: String,
    step_results: String,
    error: Option<String>,
}

impl RawResult {
    fn parse(self) -> ServeResult<RunResult> {
        let mode = Mode::parse(&self.mode).ok_or_else(|| {
            ServeError::config(format!("stored result has unknown mode {:?}", self.mode))
        })?;
        Ok(RunResult {
            run_id: self.run_id,
            test_case_id: self.test_case_id,
            mode,
            outcome: outcome_from_column(&self.outcome),
            total_steps: self.total_steps,
            passed_count: self.passed_count,
            failed_count: self.failed_count,
            execution_time_ms: self.execution_time_ms,
            parameters: serde_json::from_str(&self.parameters)?,
            step_results: serde_json::from_str(&self.step_results)?,
            error: self.error,
        })
    }
}

/// Demo catalogs covering all four travel modes
fn demo_catalog() -> Vec<(Mode, &'static str, Vec<StepDefinition>)> {
    vec![
        (
            Mode::Flight,
            "FL001",
            vec![
                StepDefinition::new("Browser", "N/A", "OPEN_BROWSER", "Flights page opens", 1),
                StepDefinition::new(
                    "FROM",
                    "[data-testid='from-input'] | //label[contains(text(),'From')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Origin city selected",
                    2,
                ),
                StepDefinition::new(
                    "TO",
                    "[data-testid='to-input'] | //label[contains(text(),'To')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Destination city selected",
                    3,
                ),
                StepDefinition::new(
                    "DepartureDate",
                    "//*[contains(@data-testid,'departure')]",
                    "CLICK_AND_SELECT_DATE",
                    "Departure date picked",
                    4,
                ),
                StepDefinition::new(
                    "TravelClass",
                    "[data-testid='travel-class']",
                    "CLICK",
                    "Travel class chosen",
                    5,
                ),
                StepDefinition::new(
                    "AdultsCount",
                    "[data-testid='adult-count']",
                    "SELECT_COUNT",
                    "Adult count set",
                    6,
                ),
                StepDefinition::new(
                    "SearchButton",
                    "//button[normalize-space(.)='Search Flights']",
                    "CLICK",
                    "Results listed",
                    7,
                ),
            ],
        ),
        (
            Mode::Bus,
            "BS001",
            vec![
                StepDefinition::new("Browser", "N/A", "OPEN_BROWSER", "Buses page opens", 1),
                StepDefinition::new(
                    "FROM",
                    "//label[contains(text(),'From')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Origin city selected",
                    2,
                ),
                StepDefinition::new(
                    "TO",
                    "//label[contains(text(),'To')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Destination city selected",
                    3,
                ),
                StepDefinition::new(
                    "BusDepartDate",
                    "[data-testid='bus-date']",
                    "CLICK_QUICK_DATE",
                    "Travel date picked",
                    4,
                ),
                StepDefinition::new(
                    "SearchButton",
                    "//button[normalize-space(.)='Search Buses']",
                    "CLICK",
                    "Results listed",
                    5,
                ),
            ],
        ),
        (
            Mode::Train,
            "TR001",
            vec![
                StepDefinition::new("Browser", "N/A", "OPEN_BROWSER", "Trains page opens", 1),
                StepDefinition::new(
                    "FROM",
                    "//label[contains(text(),'From')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Origin station selected",
                    2,
                ),
                StepDefinition::new(
                    "TO",
                    "//label[contains(text(),'To')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Destination station selected",
                    3,
                ),
                StepDefinition::new(
                    "DepartureDate",
                    "//*[contains(@data-testid,'departure')]",
                    "CLICK_AND_SELECT_DATE",
                    "Travel date picked",
                    4,
                ),
                StepDefinition::new(
                    "SearchButton",
                    "//button[normalize-space(.)='Search Trains']",
                    "CLICK",
                    "Results listed",
                    5,
                ),
            ],
        ),
        (
            Mode::Hotel,
            "HT001",
            vec![
                StepDefinition::new("Browser", "N/A", "OPEN_BROWSER", "Hotels page opens", 1),
                StepDefinition::new(
                    "DESTINATION",
                    "[data-testid='destination-input'] | //label[contains(text(),'Destination')]/following::input[1]",
                    "CLICK_AND_SELECT",
                    "Destination city selected",
                    2,
                ),
                StepDefinition::new(
                    "CheckInDate",
                    "//*[contains(@data-testid,'check-in')]",
                    "CLICK_AND_SELECT_DATE",
                    "Check-in date picked",
                    3,
                ),
                StepDefinition::new(
                    "CheckOutDate",
                    "//*[contains(@data-testid,'check-out')]",
                    "CLICK_AND_SELECT_DATE",
                    "Check-out date picked",
                    4,
                ),
                StepDefinition::new(
                    "RoomsCount",
                    "[data-testid='room-count']",
                    "SELECT_COUNT",
                    "Room count set",
                    5,
                ),
                StepDefinition::new(
                    "AdultsCount",
                    "[data-testid='adult-count']",
                    "SELECT_COUNT",
                    "Adult count set",
                    6,
                ),
                StepDefinition::new(
                    "ChildrenCount",
                    "[data-testid='children-count']",
                    "SELECT_COUNT",
                    "Children count set",
                    7,
                ),
                StepDefinition::new(
                    "CHILD 1",
                    "(//select[contains(@id,'child-age')])[1]",
                    "CLICK_AND_SELECT_AGE",
                    "Child age chosen",
                    8,
                ),
                StepDefinition::new(
                    "DoneButton",
                    "//button[normalize-space(.)='Done']",
                    "CLICK",
                    "Travellers popup closed",
                    9,
                ),
                StepDefinition::new(
                    "TermsCheckbox",
                    "#fc-checkbox",
                    "HANDLE_CHECKBOX",
                    "Terms accepted",
                    10,
                ),
                StepDefinition::new(
                    "SearchButton",
                    "//button[normalize-space(.)='Search Hotels']",
                    "CLICK",
                    "Results listed",
                    11,
                ),
            ],
        ),
    ]
}
