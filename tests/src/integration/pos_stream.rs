//! # POS Stream Integration
//!
//! Intent-carrying transactions drive the finality stream: a pending
//! update when the transaction enters the block, a finalized update at
//! commit, with cursor replay covering slow consumers.

#[cfg(test)]
mod tests {
    use crate::support::*;
    use nhb_pos::FinalityStatus;
    use nhb_tx::{Transaction, TxType};
    use primitive_types::U256;

    fn intent_transfer(
        sender: &nhb_crypto::Keypair,
        intent: &[u8],
        nonce: u64,
    ) -> Transaction {
        let mut tx = Transaction::new(TxType::TransferNhb, nonce);
        tx.to = Some([0xBB; 20]);
        tx.value = U256::from(10u64);
        tx.intent_ref = Some(intent.to_vec());
        tx.sign(sender).unwrap();
        tx
    }

    #[tokio::test]
    async fn live_subscriber_sees_pending_then_finalized() {
        let mut p = processor();
        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 1_000);
        let mut subscription = p.pos().subscribe(0);

        let tx_hash = p
            .apply_transaction(&intent_transfer(&sender, b"intent-live", 0))
            .unwrap();
        let root = p.commit();

        let pending = subscription.receiver.recv().await.unwrap();
        assert_eq!(pending.status, FinalityStatus::Pending);
        assert_eq!(pending.tx_hash, tx_hash);
        assert_eq!(pending.intent_ref, b"intent-live".to_vec());

        let finalized = subscription.receiver.recv().await.unwrap();
        assert_eq!(finalized.status, FinalityStatus::Finalized);
        assert_eq!(finalized.block_hash, root);
        assert!(finalized.sequence > pending.sequence);
    }

    #[tokio::test]
    async fn late_subscriber_recovers_via_replay() {
        let mut p = processor();
        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 1_000);

        for (i, intent) in [b"intent-a".as_slice(), b"intent-b", b"intent-c"]
            .iter()
            .enumerate()
        {
            p.apply_transaction(&intent_transfer(&sender, intent, i as u64))
                .unwrap();
        }
        p.commit();

        // 3 pending + 3 finalized updates retained.
        let subscription = p.pos().subscribe(0);
        assert_eq!(subscription.replay.len(), 6);
        assert!(subscription.replay[..3]
            .iter()
            .all(|u| u.status == FinalityStatus::Pending));
        assert!(subscription.replay[3..]
            .iter()
            .all(|u| u.status == FinalityStatus::Finalized));

        // A cursor mid-stream replays only the tail.
        let tail = p.pos().subscribe(subscription.replay[3].sequence);
        assert_eq!(tail.replay.len(), 2);
    }

    #[tokio::test]
    async fn unsubscribed_consumer_stops_receiving() {
        let mut p = processor();
        let sender = keypair();
        fund_nhb(&mut p, sender.address(), 1_000);

        let mut subscription = p.pos().subscribe(0);
        p.pos().unsubscribe(subscription.id);

        p.apply_transaction(&intent_transfer(&sender, b"intent-x", 0))
            .unwrap();
        p.commit();
        assert!(subscription.receiver.try_recv().is_err());
    }

    #[test]
    fn failed_transaction_publishes_nothing() {
        let mut p = processor();
        let sender = keypair();
        // No funds: the transfer fails after consuming nothing.
        assert!(p
            .apply_transaction(&intent_transfer(&sender, b"intent-f", 0))
            .is_err());
        p.commit();
        assert_eq!(p.pos().subscribe(0).replay.len(), 0);
    }
}
