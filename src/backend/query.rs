//! Table read descriptors rendered as REST query parameters
//! (`col=eq.value`, `order=col.desc`, `limit=n`, `select=...`).

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: String,
    select: String,
    filters: Vec<Filter>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn filter(mut self, column: &str, op: FilterOp, value: impl Display) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value: value.to_string(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Only the row filters, as used to target updates.
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|filter| {
                (
                    filter.column.clone(),
                    format!("{}.{}", filter.op.as_str(), filter.value),
                )
            })
            .collect()
    }

    /// Query parameters in the order the REST service documents them.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filter_params());
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let query = self
            .params()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        write!(f, "{}?{}", self.table, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_certificate_query() {
        let query = Query::from("user_webinars")
            .select("*,webinar:webinars(*)")
            .eq("user_id", "u1")
            .eq("status", "completed")
            .order("completed_at", false);
        assert_eq!(
            query.params(),
            vec![
                ("select".to_string(), "*,webinar:webinars(*)".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("status".to_string(), "eq.completed".to_string()),
                ("order".to_string(), "completed_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn renders_range_and_limit() {
        let query = Query::from("webinars")
            .gte("date", "2024-01-01T00:00:00+00:00")
            .order("date", true)
            .limit(3);
        assert_eq!(
            query.to_string(),
            "webinars?select=%2A&date=gte.2024-01-01T00%3A00%3A00%2B00%3A00&order=date.asc&limit=3"
        );
    }
}
