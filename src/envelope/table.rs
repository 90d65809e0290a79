//! Sectioned CSV form of an envelope.
//!
//! Every record starts with its section name; the remaining fields follow
//! the section's column list. A `#section,col,...` line precedes the first
//! row of each section so the file reads well in a spreadsheet; readers skip
//! those lines as comments.
//!
//! | section      | columns                                                       |
//! |--------------|---------------------------------------------------------------|
//! | `meta`       | key, value                                                    |
//! | `diagnostic` | message                                                       |
//! | `history`    | generation, best                                              |
//! | `move`       | neighborhood, applied                                         |
//! | `site`       | id, x, y, open, load, capacity, fixed_cost                    |
//! | `assignment` | customer, facility, demand                                    |
//! | `flow`       | facility, customer, amount                                    |
//! | `route`      | vehicle, distance, duration, drive_time, load, cost           |
//! | `stop`       | vehicle, customer, arrival, service_start, departure, load_after |
//! | `unassigned` | customer, reason                                              |
//!
//! Numbers use the shortest text that parses back to the same `f64`. An
//! empty field is `None`; a missing `meta` key is `None` too.

use std::collections::HashMap;
use std::io;

use super::{
    EngineKind, EnvelopeError, Payload, RoutePlan, RouteReport, SolutionEnvelope, SolveStats,
    SolveStatus, StopReport, UnassignedReport,
};
use crate::local_search::Neighborhood;
use crate::location::{CustomerAssignment, FacilityPlan, Flow, SiteReport};
use crate::models::{Point, UnassignedReason};
use crate::routing::MoveCount;

const META: &[&str] = &["key", "value"];
const DIAGNOSTIC: &[&str] = &["message"];
const HISTORY: &[&str] = &["generation", "best"];
const MOVE: &[&str] = &["neighborhood", "applied"];
const SITE: &[&str] = &["id", "x", "y", "open", "load", "capacity", "fixed_cost"];
const ASSIGNMENT: &[&str] = &["customer", "facility", "demand"];
const FLOW: &[&str] = &["facility", "customer", "amount"];
const ROUTE: &[&str] = &["vehicle", "distance", "duration", "drive_time", "load", "cost"];
const STOP: &[&str] = &[
    "vehicle",
    "customer",
    "arrival",
    "service_start",
    "departure",
    "load_after",
];
const UNASSIGNED: &[&str] = &["customer", "reason"];

struct TableWriter<W: io::Write> {
    csv: csv::Writer<W>,
    headed: Vec<&'static str>,
}

impl<W: io::Write> TableWriter<W> {
    fn row(&mut self, section: &'static str, columns: &[&str], fields: &[String]) -> Result<(), EnvelopeError> {
        if !self.headed.contains(&section) {
            self.headed.push(section);
            let header = std::iter::once(format!("#{section}")).chain(columns.iter().map(|c| c.to_string()));
            self.csv.write_record(header)?;
        }
        self.csv
            .write_record(std::iter::once(section).chain(fields.iter().map(String::as_str)))?;
        Ok(())
    }

    fn meta(&mut self, key: &str, value: impl ToString) -> Result<(), EnvelopeError> {
        self.row("meta", META, &[key.to_string(), value.to_string()])
    }
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

pub(super) fn write<W: io::Write>(env: &SolutionEnvelope, writer: W) -> Result<(), EnvelopeError> {
    let mut t = TableWriter {
        csv: csv::WriterBuilder::new().flexible(true).from_writer(writer),
        headed: Vec::new(),
    };

    t.meta("engine", env.engine.as_str())?;
    t.meta("status", env.status.as_str())?;
    t.meta("feasible", env.feasible)?;
    if let Some(obj) = env.objective {
        t.meta("objective", obj)?;
    }
    let kind = match &env.payload {
        None => "none",
        Some(Payload::Facility(_)) => "facility",
        Some(Payload::Routes(_)) => "routes",
    };
    t.meta("payload", kind)?;

    let s = &env.stats;
    t.meta("elapsed_ms", s.elapsed_ms)?;
    t.meta("iterations", s.iterations)?;
    t.meta("nodes", s.nodes)?;
    t.meta("attempts", s.attempts)?;
    if let Some(term) = &s.termination {
        t.meta("termination", term)?;
    }
    if let Some(seed) = s.seed {
        t.meta("seed", seed)?;
    }
    if let Some(bound) = s.best_bound {
        t.meta("best_bound", bound)?;
    }
    if let Some(gap) = s.gap {
        t.meta("gap", gap)?;
    }
    if let Some(backend) = &s.backend {
        t.meta("backend", backend)?;
    }
    if let Some(cost) = s.initial_cost {
        t.meta("initial_cost", cost)?;
    }

    match &env.payload {
        Some(Payload::Facility(plan)) => {
            t.meta("fixed_cost", plan.fixed_cost)?;
            t.meta("transport_cost", plan.transport_cost)?;
            t.meta("penalty", plan.penalty)?;
            t.meta("total_cost", plan.total_cost)?;
        }
        Some(Payload::Routes(plan)) => {
            t.meta("total_distance", plan.total_distance)?;
            t.meta("total_duration", plan.total_duration)?;
            t.meta("total_cost", plan.total_cost)?;
        }
        None => {}
    }

    for msg in &env.diagnostics {
        t.row("diagnostic", DIAGNOSTIC, &[msg.clone()])?;
    }
    for (g, best) in s.history.iter().enumerate() {
        t.row("history", HISTORY, &[g.to_string(), best.to_string()])?;
    }
    for m in &s.moves {
        t.row(
            "move",
            MOVE,
            &[m.neighborhood.as_str().to_string(), m.applied.to_string()],
        )?;
    }

    match &env.payload {
        Some(Payload::Facility(plan)) => write_facility(&mut t, plan)?,
        Some(Payload::Routes(plan)) => write_routes(&mut t, plan)?,
        None => {}
    }

    t.csv.flush()?;
    Ok(())
}

fn write_facility<W: io::Write>(t: &mut TableWriter<W>, plan: &FacilityPlan) -> Result<(), EnvelopeError> {
    for site in &plan.sites {
        t.row(
            "site",
            SITE,
            &[
                site.id.clone(),
                site.location.x.to_string(),
                site.location.y.to_string(),
                site.open.to_string(),
                site.load.to_string(),
                opt_num(site.capacity),
                site.fixed_cost.to_string(),
            ],
        )?;
    }
    for a in &plan.assignments {
        t.row(
            "assignment",
            ASSIGNMENT,
            &[
                a.customer.clone(),
                a.facility.clone().unwrap_or_default(),
                a.demand.to_string(),
            ],
        )?;
    }
    for f in &plan.flows {
        t.row(
            "flow",
            FLOW,
            &[f.facility.clone(), f.customer.clone(), f.amount.to_string()],
        )?;
    }
    Ok(())
}

fn write_routes<W: io::Write>(t: &mut TableWriter<W>, plan: &RoutePlan) -> Result<(), EnvelopeError> {
    for r in &plan.routes {
        t.row(
            "route",
            ROUTE,
            &[
                r.vehicle.clone(),
                r.distance.to_string(),
                r.duration.to_string(),
                r.drive_time.to_string(),
                r.load.to_string(),
                r.cost.to_string(),
            ],
        )?;
        for stop in &r.stops {
            t.row(
                "stop",
                STOP,
                &[
                    r.vehicle.clone(),
                    stop.customer.clone(),
                    stop.arrival.to_string(),
                    stop.service_start.to_string(),
                    stop.departure.to_string(),
                    stop.load_after.to_string(),
                ],
            )?;
        }
    }
    for u in &plan.unassigned {
        t.row(
            "unassigned",
            UNASSIGNED,
            &[u.customer.clone(), u.reason.as_str().to_string()],
        )?;
    }
    Ok(())
}

/// A record with its line number for error messages.
struct Row<'r> {
    rec: &'r csv::StringRecord,
    line: u64,
}

impl Row<'_> {
    fn text(&self, i: usize) -> Result<&str, EnvelopeError> {
        self.rec
            .get(i)
            .ok_or_else(|| EnvelopeError::Format(format!("line {}: missing column {i}", self.line)))
    }

    fn num(&self, i: usize) -> Result<f64, EnvelopeError> {
        parse_num(self.text(i)?, self.line)
    }

    fn opt_num(&self, i: usize) -> Result<Option<f64>, EnvelopeError> {
        match self.text(i)? {
            "" => Ok(None),
            s => parse_num(s, self.line).map(Some),
        }
    }

    fn opt_text(&self, i: usize) -> Result<Option<String>, EnvelopeError> {
        Ok(Some(self.text(i)?).filter(|s| !s.is_empty()).map(str::to_string))
    }

    fn flag(&self, i: usize) -> Result<bool, EnvelopeError> {
        parse_flag(self.text(i)?, self.line)
    }

    fn count(&self, i: usize) -> Result<usize, EnvelopeError> {
        let s = self.text(i)?;
        s.parse()
            .map_err(|_| EnvelopeError::Format(format!("line {}: bad count '{s}'", self.line)))
    }
}

fn parse_num(s: &str, line: u64) -> Result<f64, EnvelopeError> {
    s.parse()
        .map_err(|_| EnvelopeError::Format(format!("line {line}: bad number '{s}'")))
}

fn parse_flag(s: &str, line: u64) -> Result<bool, EnvelopeError> {
    s.parse()
        .map_err(|_| EnvelopeError::Format(format!("line {line}: bad flag '{s}'")))
}

#[derive(Default)]
struct Sections {
    meta: HashMap<String, String>,
    diagnostics: Vec<String>,
    history: Vec<f64>,
    moves: Vec<MoveCount>,
    sites: Vec<SiteReport>,
    assignments: Vec<CustomerAssignment>,
    flows: Vec<Flow>,
    routes: Vec<RouteReport>,
    unassigned: Vec<UnassignedReport>,
}

pub(super) fn read<R: io::Read>(reader: R) -> Result<SolutionEnvelope, EnvelopeError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut s = Sections::default();
    for result in csv.records() {
        let rec = result?;
        let line = rec.position().map_or(0, |p| p.line());
        let row = Row { rec: &rec, line };
        match row.text(0)? {
            "meta" => {
                s.meta.insert(row.text(1)?.to_string(), row.text(2)?.to_string());
            }
            "diagnostic" => s.diagnostics.push(row.text(1)?.to_string()),
            "history" => s.history.push(row.num(2)?),
            "move" => {
                let name = row.text(1)?;
                let neighborhood = Neighborhood::parse(name)
                    .ok_or_else(|| EnvelopeError::Format(format!("line {line}: unknown neighborhood '{name}'")))?;
                s.moves.push(MoveCount {
                    neighborhood,
                    applied: row.count(2)?,
                });
            }
            "site" => s.sites.push(SiteReport {
                id: row.text(1)?.to_string(),
                location: Point::new(row.num(2)?, row.num(3)?),
                open: row.flag(4)?,
                load: row.num(5)?,
                capacity: row.opt_num(6)?,
                fixed_cost: row.num(7)?,
            }),
            "assignment" => s.assignments.push(CustomerAssignment {
                customer: row.text(1)?.to_string(),
                facility: row.opt_text(2)?,
                demand: row.num(3)?,
            }),
            "flow" => s.flows.push(Flow {
                facility: row.text(1)?.to_string(),
                customer: row.text(2)?.to_string(),
                amount: row.num(3)?,
            }),
            "route" => s.routes.push(RouteReport {
                vehicle: row.text(1)?.to_string(),
                stops: Vec::new(),
                distance: row.num(2)?,
                duration: row.num(3)?,
                drive_time: row.num(4)?,
                load: row.num(5)?,
                cost: row.num(6)?,
            }),
            "stop" => {
                let vehicle = row.text(1)?;
                let route = s
                    .routes
                    .last_mut()
                    .filter(|r| r.vehicle == vehicle)
                    .ok_or_else(|| {
                        EnvelopeError::Format(format!("line {line}: stop for '{vehicle}' outside its route"))
                    })?;
                route.stops.push(StopReport {
                    customer: row.text(2)?.to_string(),
                    arrival: row.num(3)?,
                    service_start: row.num(4)?,
                    departure: row.num(5)?,
                    load_after: row.num(6)?,
                });
            }
            "unassigned" => {
                let text = row.text(2)?;
                let reason = UnassignedReason::parse(text)
                    .ok_or_else(|| EnvelopeError::Format(format!("line {line}: unknown reason '{text}'")))?;
                s.unassigned.push(UnassignedReport {
                    customer: row.text(1)?.to_string(),
                    reason,
                });
            }
            other => {
                return Err(EnvelopeError::Format(format!("line {line}: unknown section '{other}'")));
            }
        }
    }
    assemble(s)
}

fn assemble(mut s: Sections) -> Result<SolutionEnvelope, EnvelopeError> {
    let mut meta = std::mem::take(&mut s.meta);
    let mut take = |key: &str| meta.remove(key);
    let required = |v: Option<String>, key: &str| {
        v.ok_or_else(|| EnvelopeError::Format(format!("meta key '{key}' missing")))
    };
    let num = |v: Option<String>| v.map(|x| parse_num(&x, 0)).transpose();
    let required_num = |v: Option<String>, key: &str| parse_num(&required(v, key)?, 0);
    let int = |v: Option<String>, key: &str| -> Result<u64, EnvelopeError> {
        match v {
            None => Ok(0),
            Some(x) => x
                .parse()
                .map_err(|_| EnvelopeError::Format(format!("meta '{key}': bad integer '{x}'"))),
        }
    };

    let engine_text = required(take("engine"), "engine")?;
    let engine = EngineKind::parse(&engine_text)
        .ok_or_else(|| EnvelopeError::Format(format!("unknown engine '{engine_text}'")))?;
    let status_text = required(take("status"), "status")?;
    let status = SolveStatus::parse(&status_text)
        .ok_or_else(|| EnvelopeError::Format(format!("unknown status '{status_text}'")))?;
    let feasible = parse_flag(&required(take("feasible"), "feasible")?, 0)?;
    let objective = num(take("objective"))?;

    let stats = SolveStats {
        elapsed_ms: int(take("elapsed_ms"), "elapsed_ms")?,
        iterations: int(take("iterations"), "iterations")?,
        nodes: int(take("nodes"), "nodes")?,
        attempts: u32::try_from(int(take("attempts"), "attempts")?)
            .map_err(|e| EnvelopeError::Format(format!("meta 'attempts': {e}")))?,
        termination: take("termination"),
        seed: take("seed")
            .map(|x| {
                x.parse()
                    .map_err(|_| EnvelopeError::Format(format!("meta 'seed': bad integer '{x}'")))
            })
            .transpose()?,
        best_bound: num(take("best_bound"))?,
        gap: num(take("gap"))?,
        backend: take("backend"),
        initial_cost: num(take("initial_cost"))?,
        history: std::mem::take(&mut s.history),
        moves: std::mem::take(&mut s.moves),
    };

    let kind = take("payload").unwrap_or_else(|| "none".to_string());
    let payload = match kind.as_str() {
        "none" => None,
        "facility" => Some(Payload::Facility(FacilityPlan {
            fixed_cost: num(take("fixed_cost"))?.unwrap_or(0.0),
            transport_cost: num(take("transport_cost"))?.unwrap_or(0.0),
            penalty: num(take("penalty"))?.unwrap_or(0.0),
            total_cost: required_num(take("total_cost"), "total_cost")?,
            sites: std::mem::take(&mut s.sites),
            assignments: std::mem::take(&mut s.assignments),
            flows: std::mem::take(&mut s.flows),
        })),
        "routes" => Some(Payload::Routes(RoutePlan {
            total_distance: num(take("total_distance"))?.unwrap_or(0.0),
            total_duration: num(take("total_duration"))?.unwrap_or(0.0),
            total_cost: required_num(take("total_cost"), "total_cost")?,
            routes: std::mem::take(&mut s.routes),
            unassigned: std::mem::take(&mut s.unassigned),
        })),
        other => return Err(EnvelopeError::Format(format!("unknown payload kind '{other}'"))),
    };

    Ok(SolutionEnvelope {
        engine,
        status,
        feasible,
        objective,
        payload,
        stats,
        diagnostics: s.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{facility_envelope, route_envelope};
    use super::*;

    #[test]
    fn test_facility_round_trip() {
        let env = facility_envelope();
        let text = env.to_csv_string().expect("write");
        let back = SolutionEnvelope::from_csv_str(&text).expect("read");
        assert_eq!(back, env);
    }

    #[test]
    fn test_route_round_trip_keeps_empty_routes() {
        let env = route_envelope();
        let text = env.to_csv_string().expect("write");
        let back = SolutionEnvelope::from_csv_str(&text).expect("read");
        assert_eq!(back, env);
        let plan = back.payload.as_ref().and_then(Payload::as_routes).expect("routes");
        assert_eq!(plan.routes.len(), 2);
        assert!(plan.routes[1].is_empty());
    }

    #[test]
    fn test_headers_precede_sections() {
        let text = route_envelope().to_csv_string().expect("write");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#meta,key,value");
        assert_eq!(lines[1], "meta,engine,vrp");
        let route_header = lines.iter().position(|l| l.starts_with("#route,")).expect("route header");
        assert!(lines[route_header + 1].starts_with("route,V1,"));
        assert_eq!(text.matches("#stop,").count(), 1);
    }

    #[test]
    fn test_payload_free_envelope() {
        let env = SolutionEnvelope::new(EngineKind::FacilityMilp, SolveStatus::SolverFailure)
            .with_diagnostic("backend fault: pivot, singular");
        let text = env.to_csv_string().expect("write");
        assert!(text.contains("meta,payload,none"));
        assert_eq!(SolutionEnvelope::from_csv_str(&text).expect("read"), env);
    }

    #[test]
    fn test_stop_outside_route_is_rejected() {
        let text = "meta,engine,vrp\nmeta,status,optimal\nmeta,feasible,true\nmeta,payload,routes\n\
                    meta,total_cost,0\nstop,V9,A,0,0,0,1\n";
        let err = SolutionEnvelope::from_csv_str(text).expect_err("orphan stop");
        assert!(err.to_string().contains("outside its route"));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let text = "meta,engine,vrp\nmeta,status,optimal\nmeta,feasible,true\nbogus,1\n";
        assert!(SolutionEnvelope::from_csv_str(text).is_err());
    }

    #[test]
    fn test_missing_status_is_rejected() {
        let text = "meta,engine,vrp\nmeta,feasible,true\n";
        let err = SolutionEnvelope::from_csv_str(text).expect_err("no status");
        assert!(err.to_string().contains("status"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn stop() -> impl Strategy<Value = StopReport> {
        (
            "[A-Za-z0-9 ,\"#]{1,8}",
            -1e6..1e6f64,
            -1e6..1e6f64,
            -1e6..1e6f64,
            0.0..1e3f64,
        ).prop_map(
            |(customer, arrival, service_start, departure, load_after)| StopReport {
                customer,
                arrival,
                service_start,
                departure,
                load_after,
            },
        )
    }

    fn route() -> impl Strategy<Value = RouteReport> {
        ("V[0-9]{1,3}", prop::collection::vec(stop(), 0..4), 0.0..1e4f64, 0.0..1e4f64).prop_map(
            |(vehicle, stops, distance, duration)| RouteReport {
                vehicle,
                load: stops.len() as f64,
                cost: distance * 1.5,
                drive_time: distance,
                stops,
                distance,
                duration,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_route_table_round_trip(
            routes in prop::collection::vec(route(), 0..5),
            total in -1e9..1e9f64,
            feasible in any::<bool>(),
            seed in any::<Option<u64>>(),
        ) {
            let plan = RoutePlan {
                routes,
                unassigned: vec![],
                total_distance: total.abs(),
                total_duration: total.abs() / 3.0,
                total_cost: total,
            };
            let env = SolutionEnvelope::new(EngineKind::Vrp, SolveStatus::FeasibleNonOptimal)
                .with_payload(Payload::Routes(plan), feasible)
                .with_stats(SolveStats { seed, ..SolveStats::default() });
            let text = env.to_csv_string().expect("write");
            let back = SolutionEnvelope::from_csv_str(&text).expect("read");
            prop_assert_eq!(back.objective, env.objective);
            prop_assert_eq!(back, env);
        }
    }
}
