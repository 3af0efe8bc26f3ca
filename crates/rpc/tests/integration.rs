//! Integration tests for LendLedger
//!
//! These drive whole flows through the named-operation surface, against both
//! the in-memory and the file-backed store.

use lendledger_rpc::{serve, AppContext, LedgerConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

fn file_config(dir: &TempDir) -> LedgerConfig {
    LedgerConfig {
        data_dir: dir.path().to_path_buf(),
        ..LedgerConfig::default()
    }
}

fn register_customer(ctx: &AppContext, national_id: &str) -> String {
    let result = ctx
        .invoke(
            "RegisterCustomer",
            json!({
                "firstName": "Minh",
                "lastName": "Pham",
                "email": "minh@example.com",
                "phone": "0912",
                "dateOfBirth": "1990-05-17",
                "nationalID": national_id,
                "address": "Da Nang",
                "consentPreferences": { "dataSharing": true, "creditBureauCheck": true },
                "actorID": "ADMIN"
            }),
        )
        .unwrap();
    result.payload["customerID"].as_str().unwrap().to_string()
}

fn submit_loan(ctx: &AppContext, customer_id: &str) -> String {
    let result = ctx
        .invoke(
            "SubmitLoanApplication",
            json!({
                "customerID": customer_id,
                "loanType": "PERSONAL",
                "requestedAmount": "12000",
                "termMonths": 36,
                "purpose": "tuition",
                "actorID": "ADMIN"
            }),
        )
        .unwrap();
    assert_eq!(result.payload["status"], "Submitted");
    result.payload["loanID"].as_str().unwrap().to_string()
}

fn history(ctx: &AppContext, op: &str, id: &str) -> Vec<Value> {
    let result = ctx.invoke(op, json!({ "actorID": "ADMIN", "entityID": id })).unwrap();
    result.payload.as_array().unwrap().clone()
}

/// Test: state and history survive a restart of the file-backed store
#[test]
fn test_ledger_survives_reopen() -> Result<(), anyhow::Error> {
    let temp_dir = TempDir::new()?;

    let (customer_id, sequence) = {
        let ctx = AppContext::open(file_config(&temp_dir))?;
        ctx.init()?;
        let customer_id = register_customer(&ctx, "VN-1001");
        let updated = ctx.invoke(
            "UpdateCustomer",
            json!({ "customerID": customer_id, "phone": "0999", "actorID": "ADMIN" }),
        )?;
        (customer_id, updated.sequence)
    };

    assert!(temp_dir.path().join("ledger.jsonl").exists());

    let ctx = AppContext::open(file_config(&temp_dir))?;
    let customer = ctx.invoke("GetCustomer", json!({ "actorID": "ADMIN", "customerID": customer_id }))?;
    assert_eq!(customer.sequence, sequence);
    assert_eq!(customer.payload["phone"], "0999");
    assert_eq!(customer.payload["version"], 2);

    let records = history(&ctx, "GetCustomerHistory", &customer_id);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["changeKind"], "CREATE");
    assert_eq!(records[1]["fieldName"], "phone");

    // Init marker was replayed too
    assert!(ctx.init().unwrap_err().to_string().starts_with("ALREADY_EXISTS:"));
    Ok(())
}

/// Test: Submitted -> Approved is refused, Underwriting -> Approved succeeds
#[test]
fn test_loan_decision_flow() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    ctx.init().unwrap();
    let customer_id = register_customer(&ctx, "VN-2002");
    let loan_id = submit_loan(&ctx, &customer_id);

    let approve = json!({
        "loanID": loan_id,
        "approvedAmount": "10000",
        "interestRate": "8.25",
        "riskScore": 310,
        "notes": "stable income",
        "actorID": "ADMIN"
    });

    let err = ctx.invoke("ApproveLoan", approve.clone()).unwrap_err();
    assert!(err.to_string().starts_with("INVALID_TRANSITION:"));
    let loan = ctx
        .invoke("GetLoan", json!({ "actorID": "ADMIN", "loanID": loan_id }))
        .unwrap();
    assert_eq!(loan.payload["status"], "Submitted");
    assert_eq!(loan.payload["version"], 1);
    assert_eq!(history(&ctx, "GetLoanHistory", &loan_id).len(), 1);

    ctx.invoke(
        "UpdateLoanStatus",
        json!({ "loanID": loan_id, "newStatus": "Underwriting", "actorID": "ADMIN" }),
    )
    .unwrap();
    let approved = ctx.invoke("ApproveLoan", approve).unwrap();
    assert_eq!(approved.payload["status"], "Approved");
    assert_eq!(approved.payload["version"], 3);

    let records = history(&ctx, "GetLoanHistory", &loan_id);
    let last = records.last().unwrap();
    assert_eq!(last["changeKind"], "APPROVE");
    assert_eq!(last["transactionID"], approved.tx_id.as_str());

    let loans = ctx
        .invoke("GetLoansByCustomer", json!({ "actorID": "ADMIN", "customerID": customer_id }))
        .unwrap();
    assert_eq!(loans.payload.as_array().unwrap().len(), 1);
}

/// Test: a failing invocation commits nothing, not even staged history
#[test]
fn test_failed_invocation_leaves_no_trace() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    let init = ctx.init().unwrap();

    let err = ctx
        .invoke(
            "RegisterCustomer",
            json!({ "firstName": "No", "lastName": "Email", "actorID": "ADMIN" }),
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("VALIDATION_ERROR:"));

    let err = ctx
        .invoke("RegisterCustomer", json!({ "firstName": "Who", "actorID": "NOBODY" }))
        .unwrap_err();
    assert!(err.to_string().starts_with("ACCESS_DENIED:") || err.to_string().starts_with("VALIDATION_ERROR:"));

    let read = ctx
        .invoke("GetActor", json!({ "actorID": "ADMIN", "targetActorID": "ADMIN" }))
        .unwrap();
    assert_eq!(read.sequence, init.sequence);
}

/// Test: an actor without the capability is refused, then granted, then allowed
#[test]
fn test_capability_gate() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    ctx.init().unwrap();
    let customer_id = register_customer(&ctx, "VN-3003");

    ctx.invoke(
        "RegisterActor",
        json!({
            "targetActorID": "AUDITOR-1",
            "actorType": "InternalUser",
            "role": "Auditor",
            "capabilities": ["VIEW_CUSTOMER"],
            "actorID": "ADMIN"
        }),
    )
    .unwrap();

    let args = json!({ "actorID": "AUDITOR-1", "customerID": customer_id });
    ctx.invoke("GetCustomer", args.clone()).unwrap();
    let err = ctx.invoke("GetCustomerHistory", args.clone()).unwrap_err();
    assert!(err.to_string().starts_with("ACCESS_DENIED:"));

    ctx.invoke(
        "UpdateActorCapabilities",
        json!({
            "targetActorID": "AUDITOR-1",
            "capabilities": ["VIEW_CUSTOMER", "VIEW_HISTORY"],
            "actorID": "ADMIN"
        }),
    )
    .unwrap();
    assert_eq!(ctx.invoke("GetCustomerHistory", args.clone()).unwrap().payload.as_array().unwrap().len(), 1);

    ctx.invoke("DeactivateActor", json!({ "targetActorID": "AUDITOR-1", "actorID": "ADMIN" }))
        .unwrap();
    assert!(ctx.invoke("GetCustomer", args).unwrap_err().to_string().starts_with("ACCESS_DENIED:"));
}

/// Test: onboarding through to a validated passport
#[test]
fn test_kyc_to_passport() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    ctx.init().unwrap();
    let customer_id = register_customer(&ctx, "VN-4004");

    let kyc = ctx
        .invoke(
            "InitiateKYC",
            json!({ "customerID": customer_id, "documentHashes": ["ab12", "cd34"], "actorID": "ADMIN" }),
        )
        .unwrap();
    assert_eq!(kyc.payload["status"], "PENDING");
    let kyc_id = kyc.payload["kycID"].as_str().unwrap().to_string();

    let err = ctx
        .invoke(
            "GenerateCDP",
            json!({ "customerID": customer_id, "verificationLevel": "STANDARD", "validityDays": 30, "actorID": "ADMIN" }),
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("VALIDATION_ERROR:"));

    let verified = ctx
        .invoke(
            "UpdateKYCStatus",
            json!({ "kycID": kyc_id, "newStatus": "VERIFIED", "verificationNotes": "docs ok", "actorID": "ADMIN" }),
        )
        .unwrap();
    assert!(verified.payload["expiresAt"].is_string());

    let cdp = ctx
        .invoke(
            "GenerateCDP",
            json!({ "customerID": customer_id, "verificationLevel": "STANDARD", "validityDays": 30, "actorID": "ADMIN" }),
        )
        .unwrap();
    let cdp_id = cdp.payload["cdpID"].as_str().unwrap().to_string();
    assert_eq!(cdp.payload["status"], "VALID");

    let validation = ctx
        .invoke("ValidateCDP", json!({ "cdpID": cdp_id, "actorID": "ADMIN" }))
        .unwrap();
    assert_eq!(validation.payload["isValid"], true);

    let integrity = ctx
        .invoke("VerifyCDPIntegrity", json!({ "actorID": "ADMIN", "cdpID": cdp_id }))
        .unwrap();
    assert!(integrity.payload.is_object());

    ctx.invoke(
        "RevokeCDP",
        json!({ "cdpID": cdp_id, "revocationReason": "customer request", "actorID": "ADMIN" }),
    )
    .unwrap();
    let validation = ctx
        .invoke("ValidateCDP", json!({ "cdpID": cdp_id, "actorID": "ADMIN" }))
        .unwrap();
    assert_eq!(validation.payload["isValid"], false);

    let customer = ctx
        .invoke("GetCustomer", json!({ "actorID": "ADMIN", "customerID": customer_id }))
        .unwrap();
    assert!(customer.payload["currentCdpId"].is_null());
    assert_eq!(customer.payload["cdpHistory"].as_array().unwrap().len(), 1);
}

/// Test: sanction list feed, search and AML screening
#[test]
fn test_sanctions_and_aml() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    ctx.init().unwrap();

    let created = ctx
        .invoke(
            "CreateSanctionList",
            json!({
                "listID": "SL-OFAC",
                "name": "OFAC SDN",
                "source": "US Treasury",
                "listType": "SDN",
                "jurisdiction": "US",
                "actorID": "ADMIN"
            }),
        )
        .unwrap();
    assert_eq!(created.event.as_ref().unwrap().name, "SanctionListCreated");

    let update = ctx
        .invoke(
            "UpdateSanctionList",
            json!({
                "listID": "SL-OFAC",
                "updateType": "FULL",
                "version": "2024-01",
                "checksum": "abc",
                "updatedBy": "ADMIN",
                "entries": [
                    { "entryID": "E1", "primaryName": "Viktor Blackwood", "riskScore": 90 },
                    { "entryID": "E2", "primaryName": "Northwind Shell Co", "entityType": "ORGANIZATION", "riskScore": 70 }
                ]
            }),
        )
        .unwrap();
    assert_eq!(update.payload["totalEntries"], 2);

    let found = ctx
        .invoke(
            "SearchSanctionEntries",
            json!({ "searchTerm": "blackwood", "actorID": "ADMIN" }),
        )
        .unwrap();
    assert_eq!(found.payload.as_array().unwrap().len(), 1);

    let customer_id = {
        let result = ctx
            .invoke(
                "RegisterCustomer",
                json!({
                    "firstName": "Viktor",
                    "lastName": "Blackwood",
                    "email": "vb@example.com",
                    "phone": "0000",
                    "dateOfBirth": "1970-01-01",
                    "nationalID": "XX-1",
                    "address": "Unknown",
                    "actorID": "ADMIN"
                }),
            )
            .unwrap();
        result.payload["customerID"].as_str().unwrap().to_string()
    };

    let aml = ctx
        .invoke(
            "PerformAMLCheck",
            json!({ "customerID": customer_id, "checkType": "onboarding", "actorID": "ADMIN" }),
        )
        .unwrap();
    assert_eq!(aml.payload["status"], "FLAGGED");
    assert_eq!(aml.payload["riskScore"], 90);
}

/// Test: the stdin loop answers each line in order
#[tokio::test]
async fn test_serve_loop() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    let input = concat!(
        r#"{"op":"InitLedger","args":{"adminID":"ADMIN"},"id":1}"#,
        "\n",
        "\n",
        r#"{"op":"GetActor","args":{"actorID":"ADMIN","targetActorID":"ADMIN"},"id":2}"#,
        "\n",
        r#"{"op":"GetActor","args":{"actorID":"GHOST","targetActorID":"ADMIN"},"id":3}"#,
        "\n",
        r#"{"op":"Nope"}"#,
        "\n",
    );
    let mut output: Vec<u8> = Vec::new();

    let answered = serve(&ctx, tokio::io::BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    assert_eq!(answered, 4);

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["payload"]["role"], "SystemAdmin");
    assert_eq!(responses[2]["category"], "ACCESS_DENIED");
    assert_eq!(responses[3]["category"], "VALIDATION_ERROR");
}

/// Test: an actor and a sanction list sharing an id keep separate audit trails
#[test]
fn test_shared_id_histories_stay_apart() {
    let ctx = AppContext::in_memory(LedgerConfig {
        bootstrap_admin_id: "OFAC".into(),
        ..LedgerConfig::default()
    });
    ctx.init().unwrap();
    ctx.invoke(
        "CreateSanctionList",
        json!({
            "listID": "OFAC",
            "name": "OFAC SDN",
            "source": "US Treasury",
            "listType": "SDN",
            "jurisdiction": "US",
            "actorID": "OFAC"
        }),
    )
    .unwrap();

    let types = |op: &str| -> Vec<String> {
        let result = ctx.invoke(op, json!({ "actorID": "OFAC", "entityID": "OFAC" })).unwrap();
        result
            .payload
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["entityType"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(types("GetSanctionListHistory"), vec!["SANCTION_LIST"]);
    assert_eq!(types("GetActorHistory"), vec!["ACTOR"]);
}

/// Test: every named operation of the surface is routed
#[test]
fn test_operation_catalogue() {
    let ctx = AppContext::in_memory(LedgerConfig::default());
    let ops = ctx.operations();
    for op in [
        "RegisterCustomer",
        "InitiateKYC",
        "UpdateKYCStatus",
        "SubmitLoanApplication",
        "ApproveLoan",
        "RejectLoan",
        "GenerateCDP",
        "ValidateCDP",
        "RevokeCDP",
        "CreateSanctionList",
        "UpdateSanctionList",
        "SearchSanctionEntries",
    ] {
        assert!(ops.contains(&op), "{} not routed", op);
    }
    let mut sorted = ops.clone();
    sorted.sort_unstable();
    assert_eq!(ops, sorted);
}
