//! The physical channel to the server database (spec.md §3 "Connection
//! object" / §4.3). Wraps [`postgres::Client`] the way the teacher crate's
//! `InnerConnection` wraps a raw `sqlite3*`: one struct owns the live
//! handle, knows how to reconnect, and exposes only the narrow surface
//! the engine needs.

use crate::config::Config;
use crate::error::{ShimError, ShimResult};
use crate::value::{ParamValue, WireText};
use postgres::{Client, NoTls, Row, Statement};
use tracing::{debug, warn};

/// Status of a physical channel, checked before every server call
/// (spec.md §4.3: "On every pre-execute call the shim verifies
/// `channel.status == OK`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Ok,
    Broken,
}

/// One physical connection to the server database.
pub struct PgChannel {
    client: Client,
    status: ChannelStatus,
    cfg_snapshot: ChannelParams,
}

#[derive(Clone)]
struct ChannelParams {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
    schema: String,
    connect_timeout_secs: u64,
}

impl ChannelParams {
    fn from_config(cfg: &Config) -> Self {
        ChannelParams {
            host: cfg.host.clone(),
            port: cfg.port,
            database: cfg.database.clone(),
            user: cfg.user.clone(),
            password: cfg.password.clone(),
            schema: cfg.schema.clone(),
            connect_timeout_secs: cfg.connect_timeout_secs,
        }
    }

    fn connect(&self) -> ShimResult<Client> {
        let conn_str = format!(
            "host={} port={} dbname={} user={} password={} connect_timeout={}",
            self.host,
            self.port,
            self.database,
            self.user,
            self.password,
            self.connect_timeout_secs
        );
        let mut client = Client::connect(&conn_str, NoTls)
            .map_err(|e| ShimError::ConnectionFailure(e.to_string()))?;
        client
            .simple_query(&format!("SET search_path TO \"{}\"", self.schema))
            .map_err(|e| ShimError::ConnectionFailure(e.to_string()))?;
        Ok(client)
    }
}

impl PgChannel {
    pub fn connect(cfg: &Config) -> ShimResult<Self> {
        let params = ChannelParams::from_config(cfg);
        let client = params.connect()?;
        debug!(host = %params.host, db = %params.database, "channel connected");
        Ok(PgChannel {
            client,
            status: ChannelStatus::Ok,
            cfg_snapshot: params,
        })
    }

    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// Reconnect in place, replacing the broken client (spec.md §7
    /// `CONNECTION_FAILURE`: "reconnect attempted once").
    pub fn reconnect(&mut self) -> ShimResult<()> {
        warn!("reconnecting broken channel");
        match self.cfg_snapshot.connect() {
            Ok(client) => {
                self.client = client;
                self.status = ChannelStatus::Ok;
                Ok(())
            }
            Err(e) => {
                self.status = ChannelStatus::Broken;
                Err(e)
            }
        }
    }

    fn mark_broken_on_err<T>(&mut self, r: Result<T, postgres::Error>) -> ShimResult<T> {
        match r {
            Ok(v) => Ok(v),
            Err(e) => {
                self.status = ChannelStatus::Broken;
                Err(ShimError::ServerExecFailure(e.to_string()))
            }
        }
    }

    pub fn prepare(&mut self, sql: &str) -> ShimResult<Statement> {
        let r = self.client.prepare(sql);
        self.mark_broken_on_err(r)
    }

    pub fn query(&mut self, stmt: &Statement, params: &[ParamValue]) -> ShimResult<Vec<Row>> {
        let texts: Vec<WireText> = params.iter().map(|p| WireText(p.as_wire_text())).collect();
        let refs: Vec<&(dyn postgres::types::ToSql + Sync)> = texts
            .iter()
            .map(|t| t as &(dyn postgres::types::ToSql + Sync))
            .collect();
        let r = self.client.query(stmt, &refs[..]);
        self.mark_broken_on_err(r)
    }

    pub fn execute(&mut self, stmt: &Statement, params: &[ParamValue]) -> ShimResult<u64> {
        let texts: Vec<WireText> = params.iter().map(|p| WireText(p.as_wire_text())).collect();
        let refs: Vec<&(dyn postgres::types::ToSql + Sync)> = texts
            .iter()
            .map(|t| t as &(dyn postgres::types::ToSql + Sync))
            .collect();
        let r = self.client.execute(stmt, &refs[..]);
        self.mark_broken_on_err(r)
    }

    /// Fallback row-id retrieval when a write's `RETURNING id` clause is
    /// absent from the result (spec.md §6: `SELECT lastval()`).
    pub fn lastval(&mut self) -> ShimResult<i64> {
        let r = self.client.query_one("SELECT lastval()", &[]);
        let row = self.mark_broken_on_err(r)?;
        Ok(row.get(0))
    }

    /// One-off text query not backed by a cached prepared statement, used
    /// for the side lookups the engine does outside the main statement
    /// lifecycle (declared-type preload, `lastval()` already has its own
    /// method above).
    pub fn query_text(&mut self, sql: &str, params: &[ParamValue]) -> ShimResult<Vec<Row>> {
        let texts: Vec<WireText> = params.iter().map(|p| WireText(p.as_wire_text())).collect();
        let refs: Vec<&(dyn postgres::types::ToSql + Sync)> = texts
            .iter()
            .map(|t| t as &(dyn postgres::types::ToSql + Sync))
            .collect();
        let r = self.client.query(sql, &refs[..]);
        self.mark_broken_on_err(r)
    }

    pub fn simple_exec(&mut self, sql: &str) -> ShimResult<()> {
        let r = self.client.simple_query(sql);
        self.mark_broken_on_err(r).map(|_| ())
    }
}
