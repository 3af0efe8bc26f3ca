//! Operation dispatch table
//!
//! Every operation takes one JSON argument and returns one JSON value. The
//! handler runs inside the caller's [`Invocation`]; committing is the
//! caller's job.

use lendledger_access::ActorRegistry;
use lendledger_compliance::{AmlService, SanctionService};
use lendledger_core::{LedgerError, LedgerResult};
use lendledger_customer::{CustomerService, KycService};
use lendledger_loan::LoanService;
use lendledger_passport::PassportService;
use lendledger_store::Invocation;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::config::LedgerConfig;

/// The domain services, configured once per process
#[derive(Debug, Clone, Copy)]
pub struct Services {
    pub actors: ActorRegistry,
    pub customers: CustomerService,
    pub kyc: KycService,
    pub loans: LoanService,
    pub sanctions: SanctionService,
    pub aml: AmlService,
    pub passports: PassportService,
}

impl Services {
    pub fn from_config(config: &LedgerConfig) -> Self {
        let sanctions = SanctionService::new(config.default_search_limit, config.max_search_limit);
        Self {
            actors: ActorRegistry::new(),
            customers: CustomerService::new(),
            kyc: KycService::new(config.kyc_validity_days),
            loans: LoanService::new(),
            sanctions,
            aml: AmlService::new(sanctions),
            passports: PassportService::new(config.max_cdp_validity_days),
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

pub type Handler = fn(&Services, &mut Invocation<'_>, Value) -> LedgerResult<Value>;

/// Argument of the single-entity reads (`Get*`, `Get*History`)
#[derive(Debug, Deserialize)]
struct Lookup {
    #[serde(rename = "actorID")]
    actor_id: String,
    #[serde(
        rename = "entityID",
        alias = "targetActorID",
        alias = "customerID",
        alias = "kycID",
        alias = "loanID",
        alias = "listID",
        alias = "amlID",
        alias = "cdpID"
    )]
    id: String,
}

#[derive(Debug, Deserialize)]
struct Caller {
    #[serde(rename = "actorID")]
    actor_id: String,
}

fn decode<T: DeserializeOwned>(args: Value) -> LedgerResult<T> {
    serde_json::from_value(args).map_err(|e| LedgerError::Validation(format!("malformed arguments: {}", e)))
}

fn encode<T: Serialize>(result: T) -> LedgerResult<Value> {
    serde_json::to_value(result).map_err(|e| LedgerError::Storage(format!("unencodable result: {}", e)))
}

/// Decode the argument, run the operation, encode its result
fn call<Req, Res>(args: Value, op: impl FnOnce(Req) -> LedgerResult<Res>) -> LedgerResult<Value>
where
    Req: DeserializeOwned,
    Res: Serialize,
{
    encode(op(decode(args)?)?)
}

pub struct Router {
    routes: HashMap<&'static str, Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        let mut router = Self { routes: HashMap::new() };

        // Actors
        router.route("InitLedger", |s, inv, args| call(args, |req| s.actors.init_ledger(inv, req)));
        router.route("RegisterActor", |s, inv, args| call(args, |req| s.actors.register(inv, req)));
        router.route("GetActor", |s, inv, args| {
            call(args, |q: Lookup| s.actors.get(inv, &q.actor_id, &q.id))
        });
        router.route("UpdateActorCapabilities", |s, inv, args| {
            call(args, |req| s.actors.update_capabilities(inv, req))
        });
        router.route("ChangeActorRole", |s, inv, args| call(args, |req| s.actors.change_role(inv, req)));
        router.route("DeactivateActor", |s, inv, args| {
            call(args, |req| s.actors.set_active(inv, req, false))
        });
        router.route("ReactivateActor", |s, inv, args| {
            call(args, |req| s.actors.set_active(inv, req, true))
        });
        router.route("GetActorHistory", |s, inv, args| {
            call(args, |q: Lookup| s.actors.history(inv, &q.actor_id, &q.id))
        });

        // Customers and KYC
        router.route("RegisterCustomer", |s, inv, args| call(args, |req| s.customers.register(inv, req)));
        router.route("GetCustomer", |s, inv, args| {
            call(args, |q: Lookup| s.customers.get(inv, &q.actor_id, &q.id))
        });
        router.route("UpdateCustomer", |s, inv, args| call(args, |req| s.customers.update(inv, req)));
        router.route("UpdateCustomerStatus", |s, inv, args| {
            call(args, |req| s.customers.update_status(inv, req))
        });
        router.route("GetCustomerHistory", |s, inv, args| {
            call(args, |q: Lookup| s.customers.history(inv, &q.actor_id, &q.id))
        });
        router.route("InitiateKYC", |s, inv, args| call(args, |req| s.kyc.initiate(inv, req)));
        router.route("UpdateKYCStatus", |s, inv, args| call(args, |req| s.kyc.update_status(inv, req)));
        router.route("GetKYC", |s, inv, args| call(args, |q: Lookup| s.kyc.get(inv, &q.actor_id, &q.id)));
        router.route("GetKYCHistory", |s, inv, args| {
            call(args, |q: Lookup| s.kyc.history(inv, &q.actor_id, &q.id))
        });

        // Loans
        router.route("SubmitLoanApplication", |s, inv, args| call(args, |req| s.loans.submit(inv, req)));
        router.route("UpdateLoanStatus", |s, inv, args| call(args, |req| s.loans.update_status(inv, req)));
        router.route("ApproveLoan", |s, inv, args| call(args, |req| s.loans.approve(inv, req)));
        router.route("RejectLoan", |s, inv, args| call(args, |req| s.loans.reject(inv, req)));
        router.route("GetLoan", |s, inv, args| call(args, |q: Lookup| s.loans.get(inv, &q.actor_id, &q.id)));
        router.route("GetLoansByCustomer", |s, inv, args| {
            call(args, |q: Lookup| s.loans.by_customer(inv, &q.actor_id, &q.id))
        });
        router.route("GetLoanHistory", |s, inv, args| {
            call(args, |q: Lookup| s.loans.history(inv, &q.actor_id, &q.id))
        });

        // Sanctions
        router.route("CreateSanctionList", |s, inv, args| call(args, |req| s.sanctions.create_list(inv, req)));
        router.route("UpdateSanctionList", |s, inv, args| call(args, |req| s.sanctions.update_list(inv, req)));
        router.route("GetSanctionList", |s, inv, args| {
            call(args, |q: Lookup| s.sanctions.get_list(inv, &q.actor_id, &q.id))
        });
        router.route("ListSanctionLists", |s, inv, args| {
            call(args, |c: Caller| s.sanctions.list_lists(inv, &c.actor_id))
        });
        router.route("GetSanctionListUpdates", |s, inv, args| {
            call(args, |q: Lookup| s.sanctions.list_updates(inv, &q.actor_id, &q.id))
        });
        router.route("GetSanctionListHistory", |s, inv, args| {
            call(args, |q: Lookup| s.sanctions.history(inv, &q.actor_id, &q.id))
        });
        router.route("SearchSanctionEntries", |s, inv, args| call(args, |req| s.sanctions.search(inv, req)));
        router.route("SearchSanctionEntriesAsOf", |s, inv, args| {
            call(args, |req| s.sanctions.search_as_of(inv, req))
        });
        router.route("ScreenName", |s, inv, args| call(args, |req| s.sanctions.screen(inv, req)));

        // AML
        router.route("PerformAMLCheck", |s, inv, args| call(args, |req| s.aml.perform_check(inv, req)));
        router.route("UpdateAMLStatus", |s, inv, args| call(args, |req| s.aml.update_status(inv, req)));
        router.route("GetAML", |s, inv, args| call(args, |q: Lookup| s.aml.get(inv, &q.actor_id, &q.id)));
        router.route("GetAMLHistory", |s, inv, args| {
            call(args, |q: Lookup| s.aml.history(inv, &q.actor_id, &q.id))
        });

        // Canonical Data Passports
        router.route("GenerateCDP", |s, inv, args| call(args, |req| s.passports.generate(inv, req)));
        router.route("ValidateCDP", |s, inv, args| call(args, |req| s.passports.validate(inv, req)));
        router.route("ExpireCDP", |s, inv, args| call(args, |req| s.passports.expire(inv, req)));
        router.route("RevokeCDP", |s, inv, args| call(args, |req| s.passports.revoke(inv, req)));
        router.route("GetCDP", |s, inv, args| {
            call(args, |q: Lookup| s.passports.get(inv, &q.actor_id, &q.id))
        });
        router.route("GetCustomerCDPs", |s, inv, args| {
            call(args, |q: Lookup| s.passports.customer_cdps(inv, &q.actor_id, &q.id))
        });
        router.route("VerifyCDPIntegrity", |s, inv, args| {
            call(args, |q: Lookup| s.passports.verify_integrity(inv, &q.actor_id, &q.id))
        });
        router.route("GetCDPHistory", |s, inv, args| {
            call(args, |q: Lookup| s.passports.history(inv, &q.actor_id, &q.id))
        });

        router
    }

    fn route(&mut self, name: &'static str, handler: Handler) {
        self.routes.insert(name, handler);
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.routes.get(name).copied()
    }

    /// Operation names, sorted
    pub fn operations(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.routes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
