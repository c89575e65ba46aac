//! Prompt templates
//!
//! Every model call in the pipeline is built from one of these. League wording
//! comes from [`Sport::league`].

use crate::domain::{Matchup, Sport};

/// Stats-driven preview from the scraped matchup tables
pub fn stats_analysis_prompt(sport: Sport, game: &Matchup, game_data: &str) -> String {
    let league = sport.league();
    let Matchup { home, away } = game;
    format!(
        r#"You are a sports analyst tasked with creating a detailed preview for an upcoming {league} game between {away} and {home}. Your goal is to analyze the provided data and generate an insightful preview of the game.

Here is the game data:
<game_data>
{game_data}
</game_data>

Follow these steps to create your preview:

1. Analyze the provided data for both teams. Focus on their offensive and defensive statistics, rankings, and any standout metrics.
2. Identify the key strengths and weaknesses of each team. Pay attention to EPA per play, success rates, yards per play and national rankings.
3. Compare each offense against the opposing defense. Look for mismatches where one team has a significant advantage.
4. Note particularly impressive or concerning statistics, especially where a team ranks very high or very low nationally.
5. Write the preview with an overview of each team, key matchups, standout units and the statistical narratives that emerge.

Provide your preview in the following format:
<preview>
<{home_tag}_Analysis>
[Your analysis of {home}]
</{home_tag}_Analysis>

<{away_tag}_Analysis>
[Your analysis of {away}]
</{away_tag}_Analysis>

<matchup_overview>
[How these teams match up, including the factors that could decide the game]
</matchup_overview>
</preview>

Base your analysis solely on the provided statistical data. When referencing a statistic, give context by comparing it to national rankings or to the opponent's number in the same category. Use a professional and engaging tone, and explain complex statistics in a way an average {league} fan would understand."#,
        home_tag = home.replace(' ', "_"),
        away_tag = away.replace(' ', "_"),
    )
}

/// Analysis of a starting-lineup grade sheet
pub fn lineup_analysis_prompt(sport: Sport, lineup_data: &str) -> String {
    format!(
        r#"You are tasked with analyzing {league} starting lineup data to provide insights for game strategy and preparation.

<lineups_data>
{lineup_data}
</lineups_data>

This data contains the offensive and defensive lineups for two teams. Each player is listed with their position, grade, position rank and overall rank.

1. Identify the top performers on each team and any players with exceptionally high or low grades.
2. Compare the overall grades of the offensive and defensive units for both teams.
3. Determine the strategies each team might employ given these strengths and weaknesses.
4. Find significant mismatches between opposing players or units.
5. Recommend where each team should focus its preparation.

Present your analysis in a clear, structured format with headings. Include specific grades, ranks and positions, and focus only on the data provided. Write your complete analysis inside <analysis> tags."#,
        league = sport.league(),
    )
}

/// System framing for the retrieval-augmented narrative
pub fn search_system_prompt(sport: Sport, game: &Matchup) -> String {
    format!(
        "You are a top {league} analyst with decades of experience. You have comprehensive knowledge of {home} and {away}'s current rosters, playing styles, strengths and weaknesses, as well as deep understanding of {league} tactics and trends. Provide an expert, impartial analysis. Cover both teams equally and avoid showing favoritism. Don't add anything about predictions or betting advice.",
        league = sport.league(),
        home = game.home,
        away = game.away,
    )
}

/// Seven-section narrative request for the retrieval-augmented model
pub fn search_query_prompt(game: &Matchup) -> String {
    let Matchup { home, away } = game;
    format!(
        r#"Provide a comprehensive analysis of the upcoming {away} at {home} game, covering the following aspects:

1. Recent Performance and Trends: the last 3-4 games for both teams, current rankings, strength of schedule, roster changes, offensive and defensive trends, notable individual performances, and results against the spread.

2. Coaching Strategies and Adjustments: each coach's philosophy, typical offensive and defensive approach, recent adjustments, and likely in-game adjustments for this opponent.

3. Key Player Matchups: 3-4 critical matchups with relevant statistics, how they shape team strategy, and which players are most likely to stand out.

4. Environmental and Contextual Factors: expected weather, injuries or suspensions and returns, travel for the away team, home field advantage, and off-field distractions.

5. Historical Performance in Similar Situations: record as favorite and underdog over the past two seasons, home and away splits, conference results, and head-to-head history.

6. Fan and Media Sentiment: fan expectations, media storylines, and how public perception might move the betting lines.

7. Special Teams and X-Factors: special teams impact, potential X-factor players, and any unique tactical elements.

Provide your analysis in a structured format with headings for each section. Be concise but thorough."#
    )
}

/// System framing for the odds lookup
pub fn odds_system_prompt(sport: Sport) -> String {
    format!(
        "You are a precise AI assistant specializing in providing up-to-date sports betting odds for {} games. Always strive for accuracy and use 'N/A' if unsure.",
        sport.league()
    )
}

/// Request for the fixed `[Current Odds]` block
pub fn odds_prompt(sport: Sport, game: &Matchup) -> String {
    let Matchup { home, away } = game;
    format!(
        r#"Task: Provide the current Moneyline, Spread, and Total lines for the {away} at {home} game in {league}.

Instructions:
1. Use only the most recent odds from reputable sportsbooks, such as FanDuel, DraftKings, or ESPN.
2. If odds are not available or you're unsure, use "N/A" for that field.
3. Use whole numbers for spreads when possible (e.g., -3 instead of -3.0).
4. Always include the team names in the spread fields.
5. For totals, use decimal points if necessary (e.g., 45.5).
6. Provide your response in the exact format shown below:

[Current Odds]
Moneyline:
{away}: [AWAY_MONEYLINE_ODDS]
{home}: [HOME_MONEYLINE_ODDS]

Spread:
{away}: [AWAY_SPREAD] ([AWAY_SPREAD_ODDS])
{home}: [HOME_SPREAD] ([HOME_SPREAD_ODDS])

Total (Over/Under):
Over [TOTAL]: [OVER_ODDS]
Under [TOTAL]: [UNDER_ODDS]

Return only the formatted response. If the odds for the Total or the Spread are unavailable, assume they are -110 each. If the Moneyline odds are unavailable, use "N/A" for both teams."#,
        league = sport.league(),
    )
}

/// One independent expert opinion over the whole evidence bundle
pub fn expert_prompt(sport: Sport, game: &Matchup, evidence: &str, channels: &[&str]) -> String {
    let Matchup { home, away } = game;
    format!(
        r#"You are an advanced sports betting analyst tasked with providing value picks for an upcoming {league} game between the {away} and the {home}. Analyze the game data below, identify potential market inefficiencies, and provide picks for the Moneyline, Spread, and Total (Over/Under) bets.

The game data is divided into these sections: {sections}. Here is the game data:

<game_data>
{evidence}
</game_data>

Market Efficiency Considerations:
- Betting markets are extremely efficient and quickly incorporate publicly available information.
- Be highly skeptical of any perceived edge. Obvious advantages are already reflected in the odds.
- Look for hidden value: subtle changes in team dynamics, complex interactions between factors, or market overreactions to recent events.
- Consider how sharp money might be influencing the lines.

Provide an equal amount of analysis supporting the favorite and the underdog, and the over and the under, before making a final recommendation.

When making your picks, keep the following principles in mind:
1. Market Efficiency: only suggest a bet when you have identified a significant inefficiency the market has overlooked.
2. Burden of Proof: for every potential bet, explicitly state why the edge is not already priced in.
3. Unit System: rate each suggestion from 0 (no bet) to 5 (max bet) units. 1 unit equals 1% of the bettor's bankroll.
4. Only suggest bets with a clear edge based on the data provided.
5. Only bet the Moneyline if the line is between -200 and +200. Otherwise consider the Spread instead.
6. Bet either the Spread or the Moneyline, not both. If you bet the Moneyline, list "No Bet" for the Spread and vice versa.

Present your analysis and picks in the following JSON format:

{{"Summary": "[Brief summary of the key quantitative and qualitative findings and your overall assessment]",
"Moneyline": {{"Analysis": {{"Summary": "[Reasoning citing specific data points]", "Market Efficiency": "[Why this edge is not priced in]", "Pick": "[Moneyline pick or No Bet]", "Units": [0-5]}}}},
"Spread": {{"Analysis": {{"Summary": "[Reasoning citing specific data points]", "Market Efficiency": "[Why this edge is not priced in]", "Pick": "[Spread pick or No Bet]", "Units": [0-5]}}}},
"Total": {{"Analysis": {{"Summary": "[Reasoning citing specific data points]", "Market Efficiency": "[Why this edge is not priced in]", "Pick": "[Total pick or No Bet]", "Units": [0-5]}}}}}}

It is entirely acceptable to recommend "No Bet" in every market. Quality of analysis matters far more than quantity of bets."#,
        league = sport.league(),
        sections = channels.join(", "),
    )
}

const CONSENSUS_SHAPE: &str = r#"{"analysis": {"Moneyline": {"Summary": "...", "Key_Insights": ["..."], "Risk_Factors": ["..."]},
"Spread": {"Summary": "...", "Key_Insights": ["..."], "Risk_Factors": ["..."]},
"Total": {"Summary": "...", "Key_Insights": ["..."], "Risk_Factors": ["..."]}},
"official_picks": {"Moneyline": {"Pick": "[Official Moneyline pick or No Bet]", "Reasoning": "[Factors mentioned by multiple experts]", "Units": [0-5]},
"Spread": {"Pick": "[Official Spread pick or No Bet]", "Reasoning": "[Factors mentioned by multiple experts]", "Units": [0-5]},
"Total": {"Pick": "[Official Total pick or No Bet]", "Reasoning": "[Factors mentioned by multiple experts]", "Units": [0-5]}},
"moneyline_vs_spread": {"Preferred Bet": "[Moneyline or Spread]", "Justification": "[Why this bet offers better value]"}}"#;

/// Synthesis of the full panel into one decision
pub fn consensus_prompt(
    sport: Sport,
    game: &Matchup,
    expert_data: &str,
    include_critical_analysis: bool,
) -> String {
    let league = sport.league();
    let Matchup { home, away } = game;
    let framing = if include_critical_analysis {
        format!(
            "You are an elite {league} betting analyst and synthesizer, tasked with critically evaluating multiple expert opinions to determine the most accurate and valuable betting recommendations for the game between the {home} and the {away}. Leverage the collective wisdom of the experts while weighing the strength of each argument."
        )
    } else {
        format!(
            "You are a sports betting synthesizer tasked with aggregating multiple expert opinions into consensus betting recommendations for the {league} game between the {home} and the {away}. Summarize the collective wisdom of the experts without adding your own analysis."
        )
    };
    format!(
        r#"{framing}

Here are the analyses from the expert agents:
<expert_data>
{expert_data}
</expert_data>

For each betting market (Moneyline, Spread, and Total):
1. Tally the experts' picks and determine the most common recommendation.
2. If there's no clear consensus, choose "No Bet".
3. Summarize the most frequently mentioned factors behind the picks.
4. Average the experts' unit ratings, rounding to the nearest 0.5 unit. If the average is below 0.5, use 0 (No Bet).

Do not recommend bets on both the Moneyline and Spread. Choose the one that offers better value according to the expert opinions and list "No Bet" for the other.

Important considerations:
- If expert opinions are evenly split or too divergent, recommend "No Bet" for that market.
- In "Reasoning", list only factors mentioned by multiple experts.
- "Units" must reflect the average of the experts' recommendations.

Present your analysis and official picks in this JSON format:

{CONSENSUS_SHAPE}

Return only the JSON without any additional text. Ensure it can be loaded into a JSON object without errors."#
    )
}

/// Chat-ready rendering of a decision
pub fn format_prompt(
    sport: Sport,
    game: &Matchup,
    decision_json: &str,
    kickoff: &str,
    max_chars: usize,
) -> String {
    let Matchup { home, away } = game;
    format!(
        r#"You are converting sports prediction data into a concise, engaging and authoritative message for a Discord channel. The data contains the analysis and official picks for an upcoming {league} game, produced by an ensemble of expert AI agents given advanced stats and qualitative factors.

<prediction_data>
{decision_json}
</prediction_data>

The game kicks off at {kickoff}.

1. Start with a header of the team names between alarm emojis: 🚨{home} vs {away}🚨
2. Directly below the header, include the kickoff time: 🕒{kickoff}
3. For each betting option, use its emoji (💰 Moneyline, 🏈 Spread, 🔢 Total), state the official pick and units, and give 2-4 supporting bullet points (-) from the reasoning. Cite advanced metrics (EPA, Success Rate, DVOA) where they support the bet.
4. Include an "AI Expert Consensus" section (💡) with 3-4 bullet points summarizing the panel's view and how it led to the picks.

Key considerations:
- Refer to the AI panel as "expert AI agents".
- Avoid probabilities or percentages; use qualitative confidence terms such as "strong conviction" or "slight edge".
- Don't mention "real-time" data or responsible betting.
- Return only the formatted message.
- Make sure your response is under {max_chars} characters."#,
        league = sport.league(),
    )
}
