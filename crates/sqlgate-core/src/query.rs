//! Queries as handed to the execution layer

use serde::{Deserialize, Serialize};

use crate::{AbstractExpression, CompiledStatement, DriverHandle, Result, TranslateOptions, Translator, Value};

/// Either hand-written SQL or a plan compiled by sqlgate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// SQL in the backend's own dialect, passed through untouched
    Native {
        sql: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// A structured query translated for the target driver
    Plan(QueryPlan),
}

impl Query {
    pub fn native(sql: impl Into<String>) -> Self {
        Query::Native {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Query::Native { .. })
    }

    /// Produce the statement to send to `driver`
    pub fn compile(&self, driver: DriverHandle<'_>, options: &TranslateOptions) -> Result<CompiledStatement> {
        match self {
            Query::Native { sql, params } => Ok(CompiledStatement {
                dialect_sql: sql.clone(),
                parameters: params.clone(),
            }),
            Query::Plan(plan) => plan.compile(driver, options),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub expr: AbstractExpression,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
}

/// `SELECT projections FROM source [WHERE filter] [GROUP BY ...] [LIMIT n]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub source: TableRef,
    /// An empty list selects `*`
    #[serde(default)]
    pub projections: Vec<Projection>,
    #[serde(default)]
    pub filter: Option<AbstractExpression>,
    #[serde(default)]
    pub group_by: Vec<AbstractExpression>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl QueryPlan {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            source: TableRef {
                schema: None,
                name: table.into(),
            },
            projections: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            limit: None,
        }
    }

    pub fn project(mut self, expr: AbstractExpression, alias: Option<&str>) -> Self {
        self.projections.push(Projection {
            expr,
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn filter(mut self, expr: AbstractExpression) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn group_by(mut self, expr: AbstractExpression) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Translate every clause in textual order so parameters line up
    pub fn compile(&self, driver: DriverHandle<'_>, options: &TranslateOptions) -> Result<CompiledStatement> {
        let mut translator = Translator::new(driver, *options);

        let projections = if self.projections.is_empty() {
            "*".to_string()
        } else {
            let mut rendered = Vec::with_capacity(self.projections.len());
            for projection in &self.projections {
                let expr = translator.translate(&projection.expr)?;
                rendered.push(match &projection.alias {
                    Some(alias) => format!("{} AS {}", expr, translator.quote_identifier(alias)?),
                    None => expr,
                });
            }
            rendered.join(", ")
        };

        let mut sql = format!("SELECT {} FROM ", projections);
        if let Some(schema) = &self.source.schema {
            sql.push_str(&translator.quote_identifier(schema)?);
            sql.push('.');
        }
        sql.push_str(&translator.quote_identifier(&self.source.name)?);

        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&translator.translate(filter)?);
        }

        if !self.group_by.is_empty() {
            let mut groups = Vec::with_capacity(self.group_by.len());
            for expr in &self.group_by {
                groups.push(translator.translate(expr)?);
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        tracing::debug!(driver = %driver.id(), sql = %sql, "compiled query plan");
        Ok(translator.finish(sql))
    }
}
