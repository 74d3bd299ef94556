use super::{Entity, EntityKind};
use crate::domain::model::value::Record;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A listed company.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Stock {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub fundation: Option<NaiveDate>,
    pub description: Option<String>,
    pub icnome: Option<f64>,
    pub expenses: Option<f64>,
    pub capitalization: Option<f64>,
    pub employees: Option<i32>,
}

impl Entity for Stock {
    const KIND: EntityKind = EntityKind::Stock;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.clone())
            .with("sector", self.sector.clone())
            .with("fundation", self.fundation)
            .with("description", self.description.clone())
            .with("icnome", self.icnome)
            .with("expenses", self.expenses)
            .with("capitalization", self.capitalization)
            .with("employees", self.employees)
    }

    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id(),
            name: record.text("name"),
            sector: record.text("sector"),
            fundation: record.date("fundation"),
            description: record.text("description"),
            icnome: record.double("icnome"),
            expenses: record.double("expenses"),
            capitalization: record.double("capitalization"),
            employees: record.int("employees"),
        }
    }
}

impl PartialEq for Stock {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

/// A dated analysis, optionally about one stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Analysis {
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub stock_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<Stock>,
}

impl Analysis {
    /// Sets the parent reference and its foreign key together.
    pub fn set_stock(&mut self, stock: Option<Stock>) {
        self.stock_id = stock.as_ref().and_then(|s| s.id);
        self.stock = stock;
    }
}

impl Entity for Analysis {
    const KIND: EntityKind = EntityKind::Analysis;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("date", self.date)
            .with("description", self.description.clone())
            .with("stock_id", self.stock_id)
    }

    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id(),
            date: record.date("date"),
            description: record.text("description"),
            stock_id: record.bigint("stock_id"),
            stock: None,
        }
    }

    fn attach_parent(&mut self, parent: &Record) {
        self.set_stock(Some(Stock::from_record(parent)));
    }

    fn sync_parent_key(&mut self) {
        if self.stock_id.is_none() {
            self.stock_id = self.stock.as_ref().and_then(|s| s.id);
        }
    }
}

impl PartialEq for Analysis {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

/// A named indicator computed within an analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Indicator {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub analysis_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl Indicator {
    pub fn set_analysis(&mut self, analysis: Option<Analysis>) {
        self.analysis_id = analysis.as_ref().and_then(|a| a.id);
        self.analysis = analysis;
    }
}

impl Entity for Indicator {
    const KIND: EntityKind = EntityKind::Indicator;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.clone())
            .with("description", self.description.clone())
            .with("analysis_id", self.analysis_id)
    }

    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id(),
            name: record.text("name"),
            description: record.text("description"),
            analysis_id: record.bigint("analysis_id"),
            analysis: None,
        }
    }

    fn attach_parent(&mut self, parent: &Record) {
        self.set_analysis(Some(Analysis::from_record(parent)));
    }

    fn sync_parent_key(&mut self) {
        if self.analysis_id.is_none() {
            self.analysis_id = self.analysis.as_ref().and_then(|a| a.id);
        }
    }
}

impl PartialEq for Indicator {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Portfolio {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Entity for Portfolio {
    const KIND: EntityKind = EntityKind::Portfolio;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.clone())
            .with("description", self.description.clone())
    }

    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id(),
            name: record.text("name"),
            description: record.text("description"),
        }
    }
}

impl PartialEq for Portfolio {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

/// A holding inside a portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Position {
    pub id: Option<i64>,
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub portfolio_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<Portfolio>,
}

impl Position {
    pub fn set_portfolio(&mut self, portfolio: Option<Portfolio>) {
        self.portfolio_id = portfolio.as_ref().and_then(|p| p.id);
        self.portfolio = portfolio;
    }
}

impl Entity for Position {
    const KIND: EntityKind = EntityKind::Position;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("amount", self.amount)
            .with("price", self.price)
            .with("portfolio_id", self.portfolio_id)
    }

    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id(),
            amount: record.double("amount"),
            price: record.double("price"),
            portfolio_id: record.bigint("portfolio_id"),
            portfolio: None,
        }
    }

    fn attach_parent(&mut self, parent: &Record) {
        self.set_portfolio(Some(Portfolio::from_record(parent)));
    }

    fn sync_parent_key(&mut self) {
        if self.portfolio_id.is_none() {
            self.portfolio_id = self.portfolio.as_ref().and_then(|p| p.id);
        }
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}
