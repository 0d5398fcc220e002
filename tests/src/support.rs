//! Shared fixtures for the integration suite.

use nhb_core::{CoreConfig, Processor};
use nhb_crypto::Keypair;
use nhb_state::StateAccess;
use nhb_tx::{Transaction, TxType};
use nhb_types::Address;
use primitive_types::U256;
use rand::RngCore;

/// Random keypair for a test actor.
pub fn keypair() -> Keypair {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(kp) = Keypair::from_bytes(bytes) {
            return kp;
        }
    }
}

/// Deterministic keypair for reproducible-run tests.
pub fn fixed_keypair(seed: u8) -> Keypair {
    Keypair::from_bytes([seed; 32]).expect("non-zero seed bytes form a valid scalar")
}

/// Processor with the default config, positioned at block 1.
pub fn processor() -> Processor {
    processor_with(CoreConfig::default())
}

/// Processor with a custom config, positioned at block 1.
pub fn processor_with(config: CoreConfig) -> Processor {
    let mut p = Processor::new(config);
    p.begin_block(1, 1_700_000_000);
    p
}

/// Credit NHB directly in staged state (genesis-style seeding).
pub fn fund_nhb(p: &mut Processor, address: Address, amount: u64) {
    let mut account = p.state_mut().get_account(&address).unwrap();
    account.balance_nhb = U256::from(amount);
    p.state_mut().put_account(&address, &account).unwrap();
}

/// Credit ZNHB directly in staged state.
pub fn fund_znhb(p: &mut Processor, address: Address, amount: u64) {
    let mut account = p.state_mut().get_account(&address).unwrap();
    account.balance_znhb = U256::from(amount);
    p.state_mut().put_account(&address, &account).unwrap();
}

/// A signed NHB transfer.
pub fn transfer(sender: &Keypair, to: Address, value: u64, nonce: u64) -> Transaction {
    let mut tx = Transaction::new(TxType::TransferNhb, nonce);
    tx.to = Some(to);
    tx.value = U256::from(value);
    tx.sign(sender).unwrap();
    tx
}

/// A signed delegation.
pub fn stake(sender: &Keypair, validator: Address, value: u64, nonce: u64) -> Transaction {
    let mut tx = Transaction::new(TxType::Stake, nonce);
    tx.to = Some(validator);
    tx.value = U256::from(value);
    tx.sign(sender).unwrap();
    tx
}

/// Total ZNHB attributable to an address across all buckets.
pub fn znhb_total(p: &Processor, address: &Address) -> U256 {
    p.state().peek_account(address).unwrap().znhb_total()
}
