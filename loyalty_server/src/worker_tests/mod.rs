mod mocks;
mod reconciliation;
mod scenarios;
