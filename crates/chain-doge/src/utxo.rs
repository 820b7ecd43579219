use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DogeError;
use crate::transaction::{estimate_fee, Txid, P2PKH_INPUT_BYTES};

/// Nodes visited between deadline checks in the combination search.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction ID as a hex string (display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in koinu.
    pub value: u64,
    /// Whether the output is in a block.
    #[serde(default)]
    pub confirmed: bool,
}

/// A UTXO as reported by a block-explorer REST endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    #[serde(default)]
    pub status: ExplorerStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExplorerStatus {
    #[serde(default)]
    pub confirmed: bool,
}

impl From<ExplorerUtxo> for Utxo {
    fn from(utxo: ExplorerUtxo) -> Self {
        Self {
            txid: utxo.txid,
            vout: utxo.vout,
            value: utxo.value,
            confirmed: utxo.status.confirmed,
        }
    }
}

/// Keep only confirmed, non-zero outputs with a well-formed txid. A repeated
/// outpoint keeps its first occurrence.
pub fn filter_spendable(utxos: &[Utxo]) -> Vec<Utxo> {
    let mut seen = HashSet::new();
    utxos
        .iter()
        .filter(|u| u.confirmed && u.value > 0 && Txid::from_hex(&u.txid).is_ok())
        .filter(|u| seen.insert(outpoint(u)))
        .cloned()
        .collect()
}

/// Outpoint key, with the txid case-folded so `AB..` and `ab..` collide.
fn outpoint(utxo: &Utxo) -> (String, u32) {
    (utxo.txid.to_ascii_lowercase(), utxo.vout)
}

/// Tunables of the coin selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Fee rate in koinu per byte.
    pub fee_rate: u64,
    /// Leftover below this is folded into the fee instead of becoming change.
    pub dust_threshold: u64,
    /// Largest input count the combination search considers.
    pub max_inputs: usize,
    /// Wall-clock budget of the combination search, in milliseconds.
    pub search_budget_ms: u64,
    /// Absolute fee floor in koinu, applied after the rate estimate.
    pub min_fee: u64,
}

impl SelectionConfig {
    pub fn search_budget(&self) -> Duration {
        Duration::from_millis(self.search_budget_ms)
    }

    /// Value an input must exceed to pay for its own inclusion.
    pub fn min_economical_value(&self) -> u64 {
        P2PKH_INPUT_BYTES.saturating_mul(self.fee_rate)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fee_rate: 100,
            dust_threshold: 1_000_000,
            max_inputs: 10,
            search_budget_ms: 100,
            min_fee: 100_000,
        }
    }
}

/// What the selected inputs must pay for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRequest {
    /// Koinu sent to payment outputs.
    pub amount: u64,
    /// Number of standard (34-byte) payment outputs, excluding change.
    pub payment_outputs: usize,
    /// Extra serialized output bytes, e.g. an OP_RETURN output.
    pub extra_output_bytes: usize,
}

impl SelectionRequest {
    /// A single payment of `amount`.
    pub fn payment(amount: u64) -> Self {
        Self {
            amount,
            payment_outputs: 1,
            extra_output_bytes: 0,
        }
    }
}

/// Which rule produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Leftover below dust, folded into the fee.
    NoChange,
    /// Smallest change output at or above dust.
    MinimalChange,
    /// Largest-first accumulation.
    Greedy,
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::NoChange => write!(f, "no-change"),
            SelectionStrategy::MinimalChange => write!(f, "minimal-change"),
            SelectionStrategy::Greedy => write!(f, "greedy"),
        }
    }
}

/// Result of UTXO selection.
///
/// `total_value == amount + fee + change.unwrap_or(0)`, and a present
/// change is never below the dust threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelection {
    /// Chosen UTXOs, largest first.
    pub selected: Vec<Utxo>,
    pub total_value: u64,
    pub fee: u64,
    pub change: Option<u64>,
    pub strategy: SelectionStrategy,
    /// The combination search hit its deadline.
    pub search_exhausted: bool,
}

/// Select UTXOs to cover `request.amount` plus fee.
///
/// Tries, in order: a subset whose leftover after the one-fewer-output fee
/// is below dust; the subset with the smallest change at or above dust;
/// a largest-first greedy pass. The subset search is bounded by
/// `config.max_inputs` and `config.search_budget_ms`; when the deadline
/// passes the greedy pass decides.
pub fn select_utxos(
    utxos: &[Utxo],
    request: &SelectionRequest,
    config: &SelectionConfig,
) -> Result<UtxoSelection, DogeError> {
    let floor = config.min_economical_value();
    let mut seen = HashSet::new();
    let mut candidates: Vec<&Utxo> = Vec::with_capacity(utxos.len());
    let mut duplicates = 0usize;
    for utxo in utxos.iter().filter(|u| u.value > floor) {
        if seen.insert(outpoint(utxo)) {
            candidates.push(utxo);
        } else {
            duplicates += 1;
        }
    }
    let dropped = utxos.len() - candidates.len() - duplicates;
    if dropped > 0 {
        debug!(dropped, floor, "skipping uneconomical utxos");
    }
    if duplicates > 0 {
        warn!(duplicates, "ignoring repeated outpoints");
    }
    candidates.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then_with(|| a.txid.cmp(&b.txid))
            .then_with(|| a.vout.cmp(&b.vout))
    });

    let fees = FeeTable::new(candidates.len(), request, config);
    let available = candidates
        .iter()
        .fold(0u64, |acc, u| acc.saturating_add(u.value));
    let needed = request.amount.saturating_add(fees.one(candidates.len()));
    if candidates.is_empty() || available < needed {
        return Err(DogeError::InsufficientFunds { needed, available });
    }

    let values: Vec<u64> = candidates.iter().map(|u| u.value).collect();
    let mut search = Search::new(&values, request.amount, config, &fees);
    search.run();

    let (indices, strategy) = match (search.exact.take(), search.best.take()) {
        (Some(indices), _) => (indices, SelectionStrategy::NoChange),
        (None, Some((_, indices))) if !search.timed_out => {
            (indices, SelectionStrategy::MinimalChange)
        }
        _ => {
            if search.timed_out {
                warn!(
                    budget_ms = config.search_budget_ms,
                    nodes = search.nodes,
                    "utxo search deadline reached, falling back to greedy"
                );
            }
            (greedy(&values, request.amount, &fees), SelectionStrategy::Greedy)
        }
    };

    let selected: Vec<Utxo> = indices.iter().map(|&i| candidates[i].clone()).collect();
    let total_value = indices
        .iter()
        .fold(0u64, |acc, &i| acc.saturating_add(values[i]));
    let (fee, change) = settle(total_value, request.amount, indices.len(), &fees, config);

    info!(
        %strategy,
        inputs = selected.len(),
        total_value,
        fee,
        change = change.unwrap_or(0),
        "selected utxos"
    );

    Ok(UtxoSelection {
        selected,
        total_value,
        fee,
        change,
        strategy,
        search_exhausted: search.timed_out,
    })
}

/// Split the surplus over `amount` into fee and change.
fn settle(
    total: u64,
    amount: u64,
    inputs: usize,
    fees: &FeeTable,
    config: &SelectionConfig,
) -> (u64, Option<u64>) {
    let surplus = total.saturating_sub(amount);
    let fee_two = fees.two(inputs);
    match surplus.checked_sub(fee_two) {
        Some(change) if change >= config.dust_threshold => (fee_two, Some(change)),
        _ => (surplus, None),
    }
}

/// Fees by input count, for the payment outputs alone and with change.
struct FeeTable {
    one: Vec<u64>,
    two: Vec<u64>,
}

impl FeeTable {
    fn new(max_inputs: usize, request: &SelectionRequest, config: &SelectionConfig) -> Self {
        let outputs = request.payment_outputs;
        let extra = request.extra_output_bytes;
        let fee = |k, n| estimate_fee(k, n, extra, config.fee_rate).max(config.min_fee);
        let one = (0..=max_inputs).map(|k| fee(k, outputs)).collect();
        let two = (0..=max_inputs).map(|k| fee(k, outputs + 1)).collect();
        Self { one, two }
    }

    fn one(&self, inputs: usize) -> u64 {
        self.one[inputs]
    }

    fn two(&self, inputs: usize) -> u64 {
        self.two[inputs]
    }
}

/// Depth-first search over input subsets, largest values first.
struct Search<'a> {
    values: &'a [u64],
    /// `suffix[i]` is the sum of `values[i..]`.
    suffix: Vec<u64>,
    amount: u64,
    dust: u64,
    limit: usize,
    fees: &'a FeeTable,
    deadline: Option<Instant>,
    nodes: u64,
    timed_out: bool,
    exact: Option<Vec<usize>>,
    best: Option<(u64, Vec<usize>)>,
}

impl<'a> Search<'a> {
    fn new(values: &'a [u64], amount: u64, config: &SelectionConfig, fees: &'a FeeTable) -> Self {
        let mut suffix = vec![0u64; values.len() + 1];
        for i in (0..values.len()).rev() {
            suffix[i] = suffix[i + 1].saturating_add(values[i]);
        }
        Self {
            values,
            suffix,
            amount,
            dust: config.dust_threshold,
            limit: config.max_inputs.min(values.len()),
            fees,
            deadline: Instant::now().checked_add(config.search_budget()),
            nodes: 0,
            timed_out: false,
            exact: None,
            best: None,
        }
    }

    fn run(&mut self) {
        let mut chosen = Vec::with_capacity(self.limit);
        self.visit(0, &mut chosen, 0);
    }

    /// Returns `true` when the search should stop.
    fn visit(&mut self, start: usize, chosen: &mut Vec<usize>, total: u64) -> bool {
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.timed_out = true;
                    return true;
                }
            }
        }
        self.nodes += 1;

        let count = chosen.len();
        if count > 0 {
            let need_one = self.amount.saturating_add(self.fees.one(count));
            if let Some(leftover) = total.checked_sub(need_one) {
                if leftover < self.dust {
                    self.exact = Some(chosen.clone());
                    return true;
                }
            }

            let need_two = self.amount.saturating_add(self.fees.two(count));
            if let Some(change) = total.checked_sub(need_two) {
                if change >= self.dust {
                    if self.best.as_ref().is_none_or(|(best, _)| change < *best) {
                        self.best = Some((change, chosen.clone()));
                    }
                    // Every extension only grows the leftover.
                    return false;
                }
            }
        }

        if count == self.limit {
            return false;
        }

        let remaining = self.values.len() - start;
        let reachable = total.saturating_add(self.suffix[start]);
        if reachable < self.amount.saturating_add(self.fees.one(count + remaining)) {
            return false;
        }

        for i in start..self.values.len() {
            if i > start && self.values[i] == self.values[i - 1] {
                continue;
            }
            chosen.push(i);
            if self.visit(i + 1, chosen, total.saturating_add(self.values[i])) {
                return true;
            }
            chosen.pop();
        }
        false
    }
}

/// Indices of the shortest largest-first prefix covering amount plus fee.
fn greedy(values: &[u64], amount: u64, fees: &FeeTable) -> Vec<usize> {
    let mut total = 0u64;
    for (i, value) in values.iter().enumerate() {
        total = total.saturating_add(*value);
        if total >= amount.saturating_add(fees.one(i + 1)) {
            return (0..=i).collect();
        }
    }
    (0..values.len()).collect()
}
