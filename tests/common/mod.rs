// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use oprollups::codec::CallData;
use oprollups::commitment::u64_word;
use oprollups::ledger::{LedgerParams, SimulatedChain, SimulatedLedger};
use oprollups::{
    Address, ClientConfig, FraudMonitor, FunctionRegistry, Hash, Ledger, TransitionEngine, VerifierSet, Word,
};

pub const ALICE: Address = [0xa1; 20];
pub const BOB: Address = [0xb0; 20];
pub const CAROL: Address = [0xc0; 20];

pub const BOND: u128 = 100;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counter state: a big-endian u64 in the last 8 bytes
pub fn state(n: u64) -> Hash {
    u64_word(n)
}

pub fn word(n: u64) -> Word {
    u64_word(n)
}

pub fn counter(hash: &Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[24..]);
    u64::from_be_bytes(bytes)
}

pub fn registry() -> FunctionRegistry {
    FunctionRegistry::new().with("add", 1).with("set", 1)
}

/// Pure counter logic for every registered function
pub fn counter_logic(registry: &FunctionRegistry) -> VerifierSet {
    let add = registry.get("add").map(|def| def.selector).unwrap();
    let set = registry.get("set").map(|def| def.selector).unwrap();

    VerifierSet::new()
        .with(add, |call: &CallData| {
            let arg = call.args.first().ok_or_else(|| "add takes one argument".to_string())?;
            counter(&call.current_state)
                .checked_add(counter(arg))
                .map(state)
                .ok_or_else(|| "counter overflow".to_string())
        })
        .with(set, |call: &CallData| {
            call.args
                .first()
                .copied()
                .ok_or_else(|| "set takes one argument".to_string())
        })
}

pub struct Harness {
    pub chain: Arc<SimulatedChain>,
    pub registry: Arc<FunctionRegistry>,
    pub logic: Arc<VerifierSet>,
}

pub fn setup() -> Harness {
    init_logging();
    let registry = registry();
    let logic = Arc::new(counter_logic(&registry));
    let chain = SimulatedChain::new(logic.clone(), LedgerParams::default());

    Harness {
        chain,
        registry: Arc::new(registry),
        logic,
    }
}

impl Harness {
    pub fn ledger(&self, who: Address) -> Arc<SimulatedLedger> {
        Arc::new(self.chain.connect(who))
    }

    pub fn engine(&self, who: Address) -> TransitionEngine<SimulatedLedger> {
        TransitionEngine::new(
            self.ledger(who),
            Arc::clone(&self.registry),
            ClientConfig::default(),
            who,
            state(0),
        )
    }

    /// Engine of an account created with the full bond
    pub async fn initialized(&self, who: Address) -> TransitionEngine<SimulatedLedger> {
        let mut engine = self.engine(who);
        engine.initialize(BOND).await.unwrap();
        engine
    }

    /// Monitor using the local counter verifiers
    pub fn monitor(&self, who: Address) -> FraudMonitor<SimulatedLedger> {
        FraudMonitor::new(
            self.ledger(who),
            self.logic.clone(),
            counter_logic(&self.registry),
            ClientConfig::default(),
        )
    }

    pub async fn committed(&self, who: Address) -> Hash {
        self.ledger(who).account_hash(who).await.unwrap()
    }
}
